//! Provides [init] to set up node logging.
use env_logger::fmt::Color;
use std::io::Write as _;

/// Initializes [env_logger] from `RUST_LOG` (default `info`) with a compact
/// timestamped format on stdout.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(format_record)
        .target(env_logger::Target::Stdout)
        .init();
}

fn format_record(
    formatter: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    let now = chrono::Local::now();

    let context = format!(
        "{time} {level:<5} {target}",
        time = now.format("%H:%M:%S%.3f"),
        level = record.level(),
        target = record.target(),
    );

    writeln!(
        formatter,
        "{context}  {msg}",
        context = formatter
            .style()
            // Intense black renders as grey
            .set_color(Color::Black)
            .set_intense(true)
            .value(context),
        msg = record.args()
    )
}

use std::io::Write;

use log::LevelFilter;

/// Sets up the logger writing `<LEVEL>: <message>` lines to standard error.
///
/// Warnings are shown by default, debug output with `verbose`. `RUST_LOG`
/// overrides both.
pub fn setup_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
    builder.format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()));

    // Overwrite the defaults from env
    builder.parse_default_env();
    builder.init();
}

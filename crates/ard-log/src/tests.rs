use crate::*;

#[test]
fn console_only_init() {
    let config = LogConfig {
        level: LevelFilter::Off,
        file_dir: None,
        ..LogConfig::default()
    };

    assert!(init(&config).is_ok());
    assert!(matches!(
        init(&config),
        Err(LogInitError::AlreadyInitialized(_))
    ));
}

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.cache.capacity, 2048);
    assert_eq!(settings.files.cache_control, "private, max-age=86400");
    assert_eq!(settings.files.cache_seconds, 86_400);
    assert_eq!(settings.site.theme, "default");
    assert_eq!(settings.auth.user_header, "x-forwarded-email");
    assert_eq!(settings.auth.admin_header, "x-forwarded-admin");
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert!(settings.site.analytics_id.is_none());
}

#[test]
fn uploads_limit_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        uploads_max_request_bytes: Some(1_572_864),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.uploads.max_request_bytes.get(), 1_572_864);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_cache_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.capacity = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.capacity",
            ..
        }
    ));
}

#[test]
fn identity_headers_are_lowercased_and_validated() {
    let mut raw = RawSettings::default();
    raw.auth.user_header = Some("X-Auth-Email".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.auth.user_header, "x-auth-email");

    let mut raw = RawSettings::default();
    raw.auth.admin_header = Some("bad header".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid header");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.admin_header",
            ..
        }
    ));
}

#[test]
fn blank_analytics_id_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.site.analytics_id = Some("   ".to_string());
    raw.site.title = Some("Team Wiki".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.site.analytics_id.is_none());
    assert_eq!(settings.site.title, "Team Wiki");
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["sitecreator"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_init_arguments() {
    let args = CliArgs::parse_from([
        "sitecreator",
        "init",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("init command") {
        Command::Init(init) => {
            assert_eq!(
                init.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_export_users_arguments() {
    let args = CliArgs::parse_from(["sitecreator", "export-users", "/tmp/users.csv"]);

    match args.command.expect("export-users command") {
        Command::ExportUsers(export) => {
            assert!(export.database.database_url.is_none());
            assert_eq!(export.file, std::path::Path::new("/tmp/users.csv"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_import_users_arguments() {
    let args = CliArgs::parse_from([
        "sitecreator",
        "import-users",
        "--complete",
        "--database-url",
        "postgres://example",
        "/tmp/users.csv",
    ]);

    match args.command.expect("import-users command") {
        Command::ImportUsers(import) => {
            assert!(import.complete);
            assert_eq!(
                import.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(import.file, std::path::Path::new("/tmp/users.csv"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn serve_overrides_parse_from_cli() {
    let args = CliArgs::parse_from([
        "sitecreator",
        "serve",
        "--server-port",
        "8080",
        "--cache-capacity",
        "64",
        "--log-json",
        "true",
    ]);

    let Some(Command::Serve(serve)) = args.command else {
        panic!("serve command expected");
    };
    assert_eq!(serve.overrides.server_port, Some(8080));
    assert_eq!(serve.overrides.cache_capacity, Some(64));
    assert_eq!(serve.overrides.log_json, Some(true));
}

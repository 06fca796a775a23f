use rowshape::db::{Config, ConfigError, Facade};
use rowshape::layout::{layout_list_of, row_value_of};
use rowshape::logging;
use rowshape::types::{DbError, Result};

#[test]
fn facade_from_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("app.db");
    let config_path = dir.path().join("rowshape.toml");
    std::fs::write(
        &config_path,
        format!(
            "default_portion_size = 2\nlog_level = \"rowshape=debug\"\n\n[sqlite]\npath = {:?}\nbusy_timeout_ms = 250\n",
            db_path.display().to_string()
        ),
    )?;

    let config = Config::load(&config_path)?;
    assert_eq!(config.default_portion_size, 2);
    assert_eq!(config.sqlite.busy_timeout_ms, 250);
    logging::init_from_config(&config)?;
    assert!(matches!(
        logging::init_logging("info"),
        Err(DbError::Invalid(_))
    ));

    let facade = Facade::sqlite(config);
    let numbers = facade.in_session(|session| {
        session
            .command("create table n (v integer)")?
            .run()?;
        let mut insert = session.command("insert into n values (?)")?;
        for v in 1..=5i64 {
            insert.with_params([v])?.run()?;
        }
        let mut runner = session.query(
            "select v from n order by v",
            layout_list_of(row_value_of::<i64>()),
        )?;
        assert_eq!(runner.portion_size(), 2);
        let mut packs = Vec::new();
        while let Some(pack) = runner.next_pack()? {
            packs.push(pack);
        }
        Ok(packs)
    })?;
    assert_eq!(numbers, vec![vec![1, 2], vec![3, 4], vec![5]]);
    assert!(db_path.exists());
    Ok(())
}

#[test]
fn invalid_config_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "default_portion_size = 0\n").expect("write config");

    let err: DbError = Config::load(&path).unwrap_err().into();
    assert!(err.is_configuration());
    assert!(matches!(
        err,
        DbError::Config(ConfigError::Invalid {
            key: "default_portion_size",
            ..
        })
    ));

    let err = Config::from_toml_str("default_portion_size = \"many\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

use rowshape::db::{Config, Facade, Session, SqlScript};
use rowshape::inter::sqlite::SqliteConnector;
use rowshape::layout::{
    layout_array_of_long, layout_existence, layout_list_of, layout_map_of, layout_set_of,
    layout_single_value_of, row_struct_of, row_value_of,
};
use rowshape::row_struct;
use rowshape::types::{DbError, Result, Value};

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    id: i64,
    name: String,
    email: Option<String>,
    active: bool,
}

row_struct!(Person {
    id: i64,
    name: String,
    email: Option<String>,
    active: bool,
});

const SCHEMA: &str = "
    -- people known to the system
    create table people (
        id integer primary key,
        name text not null,
        email text,
        active integer not null default 1
    );
    insert into people (id, name, email) values (1, 'ann', 'ann@example.com');
    insert into people (id, name, email, active) values (2, 'bob', null, 0);
";

fn seeded(session: &Session) -> Result<()> {
    let affected = session.script(SqlScript::parse(SCHEMA))?.run()?;
    assert_eq!(affected, 2);
    Ok(())
}

fn memory_facade() -> Facade {
    Facade::new(SqliteConnector::in_memory(), Config::default())
}

#[test]
fn query_shapes_over_sqlite() -> Result<()> {
    let facade = memory_facade();
    let session = facade.open_session()?;
    seeded(&session)?;

    let people = session
        .query(
            "select id, name, email, active from people order by id",
            layout_list_of(row_struct_of::<Person>()),
        )?
        .run()?
        .unwrap_or_default();
    assert_eq!(people.len(), 2);
    assert_eq!(people[0].email.as_deref(), Some("ann@example.com"));
    assert!(people[0].active);
    assert_eq!(
        people[1],
        Person {
            id: 2,
            name: "bob".into(),
            email: None,
            active: false,
        }
    );

    let names = session
        .query("select id, name from people", layout_map_of::<i64, String>())?
        .run()?
        .unwrap_or_default();
    assert_eq!(names.get(&2).map(String::as_str), Some("bob"));

    let ids = session
        .query("select id from people order by id", layout_array_of_long())?
        .run()?;
    assert_eq!(ids, Some(vec![1, 2]));

    let flags = session
        .query("select active from people", layout_set_of(row_value_of::<bool>()))?
        .run()?
        .unwrap_or_default();
    assert_eq!(flags.len(), 2);

    let exists = session
        .query("select 1 from people where name = ?", layout_existence())?
        .with_params(["cid"])?
        .run()?;
    assert_eq!(exists, Some(false));
    Ok(())
}

#[test]
fn commands_bind_parameters_and_report_changes() -> Result<()> {
    let facade = memory_facade();
    let session = facade.open_session()?;
    seeded(&session)?;

    let mut insert = session.command("insert into people (id, name, email) values (?, ?, ?)")?;
    for (id, name) in [(3i64, "cid"), (4, "dee")] {
        let affected = insert
            .with_params([Value::Int(id), Value::from(name), Value::Null])?
            .run()?;
        assert_eq!(affected, 1);
    }

    let updated = session
        .command("update people set active = 0 where id > ?")?
        .with_params([1i64])?
        .run()?;
    assert_eq!(updated, 3);

    let count = session
        .query(
            "select count(*) from people where active = 0",
            layout_single_value_of::<i64>(),
        )?
        .run()?;
    assert_eq!(count, Some(3));

    let err = insert.with_params([Value::Int(5)])?.run().unwrap_err();
    assert!(matches!(err, DbError::Parameter(_)));
    Ok(())
}

#[test]
fn rolled_back_transaction_leaves_no_rows() -> Result<()> {
    let facade = memory_facade();
    let session = facade.open_session()?;
    seeded(&session)?;

    let err = session
        .in_transaction_do(|tx| {
            tx.command("delete from people")?.run()?;
            Err(DbError::Invalid("abort"))
        })
        .unwrap_err();
    assert!(matches!(err, DbError::Invalid("abort")));

    let count = session
        .query("select count(*) from people", layout_single_value_of::<i64>())?
        .run()?;
    assert_eq!(count, Some(2));

    session.in_transaction_do(|tx| {
        tx.command("delete from people where id = 2")?.run()?;
        Ok(())
    })?;
    let count = session
        .query("select count(*) from people", layout_single_value_of::<i64>())?
        .run()?;
    assert_eq!(count, Some(1));
    Ok(())
}

#[test]
fn file_database_outlives_sessions() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.sqlite.path = Some(dir.path().join("people.db"));
    let facade = Facade::sqlite(config);
    assert_eq!(facade.driver_name(), "sqlite");

    facade.in_session(seeded)?;
    let names = facade.in_session(|session| {
        assert_eq!(session.ping()?, 1);
        session
            .query(
                "select name from people order by name",
                layout_list_of(row_value_of::<String>()),
            )?
            .pack_by(1)?
            .run()
    })?;
    assert_eq!(names, Some(vec!["ann".to_string(), "bob".to_string()]));
    assert_eq!(facade.active_sessions(), 0);

    let reopened = Facade::new(
        SqliteConnector::file(dir.path().join("people.db")),
        Config::default(),
    );
    let count = reopened.in_session(|session| {
        session
            .query("select count(*) from people", layout_single_value_of::<i64>())?
            .run()
    })?;
    assert_eq!(count, Some(2));
    Ok(())
}

#[test]
fn invalid_sql_fails_at_prepare() -> Result<()> {
    let facade = memory_facade();
    let session = facade.open_session()?;
    let mut runner = session.query("selec nothing", layout_existence())?;
    assert!(matches!(runner.prepare(), Err(DbError::Sqlite(_))));
    assert!(!runner.is_prepared());
    Ok(())
}

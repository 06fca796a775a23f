use rowshape::db::{Config, Facade, RunnerKind};
use rowshape::inter::memory::{MemoryDriver, MemoryResponse};
use rowshape::layout::{
    layout_array_of, layout_array_of_int, layout_existence, layout_list_of, layout_one_row_of,
    layout_single_value_of, row_array_of, row_struct_of,
};
use rowshape::row_struct;
use rowshape::types::{DbError, Result, Value};

#[derive(Debug, Default, Clone, PartialEq)]
struct Order {
    id: i64,
    customer: String,
    note: Option<String>,
    paid: bool,
}

row_struct!(Order {
    id: i64,
    customer: String,
    note: Option<String>,
    paid: bool,
});

fn order_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(1), Value::from("ann"), Value::Null, Value::Int(1)],
        vec![Value::Int(2), Value::from("bob"), Value::from("rush"), Value::Bool(false)],
        vec![Value::Int(3), Value::from("cid"), Value::Null, Value::Int(0)],
    ]
}

fn driver() -> MemoryDriver {
    MemoryDriver::new()
        .with_rows("select * from orders", order_rows())
        .with_handler("select * from orders where id = ?", |params| {
            let rows = order_rows()
                .into_iter()
                .filter(|row| params.first() == row.first())
                .collect();
            Ok(MemoryResponse::Rows(rows))
        })
        .with_rows(
            "select count(*) from orders",
            vec![vec![Value::from("3")]],
        )
}

#[test]
fn struct_rows_are_mapped_by_position() -> Result<()> {
    let facade = Facade::new(driver(), Config::default());
    let orders = facade.in_session(|session| {
        session
            .query("select * from orders", layout_list_of(row_struct_of::<Order>()))?
            .run()
    })?;
    let orders = orders.unwrap_or_default();
    assert_eq!(orders.len(), 3);
    assert_eq!(
        orders[0],
        Order {
            id: 1,
            customer: "ann".into(),
            note: None,
            paid: true,
        }
    );
    assert_eq!(orders[1].note.as_deref(), Some("rush"));
    assert!(!orders[2].paid);
    Ok(())
}

#[test]
fn one_row_lookup_by_parameter() -> Result<()> {
    let facade = Facade::new(driver(), Config::default());
    let session = facade.open_session()?;
    let mut lookup = session.query(
        "select * from orders where id = ?",
        layout_one_row_of(row_struct_of::<Order>()),
    )?;

    let bob = lookup.with_params([2i64])?.run()?;
    assert_eq!(bob.map(|o| o.customer), Some("bob".to_string()));

    let nobody = lookup.with_params([99i64])?.run()?;
    assert_eq!(nobody, None);
    Ok(())
}

#[test]
fn scalar_and_primitive_results() -> Result<()> {
    let facade = Facade::new(driver(), Config::default());
    let session = facade.open_session()?;

    let count = session
        .query("select count(*) from orders", layout_single_value_of::<i32>())?
        .run()?;
    assert_eq!(count, Some(3));

    let ids = session
        .query("select * from orders", layout_array_of_int())?
        .run()?;
    assert_eq!(ids, Some(vec![1, 2, 3]));

    let any = session
        .query("select * from orders", layout_existence())?
        .run()?;
    assert_eq!(any, Some(true));
    Ok(())
}

#[test]
fn array_rows_keep_nulls() -> Result<()> {
    let facade = Facade::new(driver(), Config::default());
    let session = facade.open_session()?;
    let rows = session
        .query("select * from orders", layout_array_of(row_array_of::<Value>()))?
        .run()?
        .unwrap_or_default();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][2], None);
    assert_eq!(rows[1][1], Some(Value::from("bob")));
    Ok(())
}

#[test]
fn streaming_config_cuts_small_portions() -> Result<()> {
    let rows: Vec<Vec<Value>> = (0..40).map(|i| vec![Value::Int(i)]).collect();
    let driver = MemoryDriver::new().with_rows("select n", rows);
    let facade = Facade::new(driver.clone(), Config::streaming());
    let session = facade.open_session()?;
    let mut runner = session.query(
        "select n",
        layout_list_of(rowshape::layout::row_value_of::<i64>()),
    )?;
    assert_eq!(runner.portion_size(), 16);

    let mut sizes = Vec::new();
    while let Some(pack) = runner.next_pack()? {
        sizes.push(pack.len());
    }
    assert_eq!(sizes, vec![16, 16, 8]);
    assert_eq!(driver.stats().portions, 3);
    Ok(())
}

#[test]
fn session_lists_open_runners() -> Result<()> {
    let facade = Facade::new(driver(), Config::default());
    let session = facade.open_session()?;
    let _query = session.query("select * from orders", layout_existence())?;
    let _command = session.command("delete from orders")?;

    let open = session.open_runners();
    assert_eq!(open.len(), 2);
    assert_eq!(open[0].1.kind, RunnerKind::Query);
    assert_eq!(open[1].1.kind, RunnerKind::Command);
    assert_eq!(open[1].1.text, "delete from orders");
    Ok(())
}

#[test]
fn type_errors_surface_from_run() {
    let driver = MemoryDriver::new().with_rows("select name", vec![vec![Value::from("zed")]]);
    let facade = Facade::new(driver, Config::default());
    let err = facade
        .in_session(|session| {
            session
                .query("select name", layout_single_value_of::<i64>())?
                .run()
        })
        .unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch { .. }));
    assert_eq!(facade.active_sessions(), 0);
}

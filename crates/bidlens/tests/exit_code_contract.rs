use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

fn bidlens(temp: &std::path::Path) -> Command {
    let home_dir = temp.join("home");
    let cwd = temp.join("cwd");
    std::fs::create_dir_all(&home_dir).expect("home dir should be creatable");
    std::fs::create_dir_all(&cwd).expect("cwd dir should be creatable");

    let mut command = Command::new(env!("CARGO_BIN_EXE_bidlens"));
    command
        .arg("--home-dir")
        .arg(&home_dir)
        .arg("--cwd")
        .arg(&cwd);
    command
}

fn write_fixture_warehouse(path: &std::path::Path) {
    let connection = rusqlite::Connection::open(path).expect("fixture db should open");
    connection
        .execute_batch(
            "CREATE TABLE items (unique_id TEXT, category TEXT, model TEXT, hammer REAL, total_fees REAL);
             INSERT INTO items VALUES ('A1', 'Trucks', 'F-150', 18000.0, 900.0);",
        )
        .expect("fixture should load");
}

#[test]
fn missing_required_args_exits_with_usage_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_bidlens"))
        .args(["query", "sql"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_USAGE_ERROR));
}

#[test]
fn write_statements_exit_with_validation_code() {
    let temp = unique_temp_dir("bidlens-exit-write");
    let status = bidlens(&temp)
        .args(["query", "sql", "DELETE FROM items"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_VALIDATION_FAILURE));
}

#[test]
fn unknown_dimension_exits_with_validation_code() {
    let temp = unique_temp_dir("bidlens-exit-dimension");
    let status = bidlens(&temp)
        .args(["report", "comprehensive", "--dimension", "planet"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_VALIDATION_FAILURE));
}

#[test]
fn missing_warehouse_exits_with_runtime_code() {
    let temp = unique_temp_dir("bidlens-exit-missing-warehouse");
    let status = bidlens(&temp)
        .args(["query", "sql", "SELECT * FROM items"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_RUNTIME_FAILURE));
}

#[test]
fn guarded_select_prints_formatted_rows() {
    let temp = unique_temp_dir("bidlens-exit-success");
    std::fs::create_dir_all(&temp).expect("temp dir should be creatable");
    let warehouse = temp.join("warehouse.sqlite");
    write_fixture_warehouse(&warehouse);

    let output = bidlens(&temp)
        .arg("--warehouse")
        .arg(&warehouse)
        .args([
            "query",
            "sql",
            "SELECT unique_id, hammer FROM items WHERE category = ?1",
            "--params",
            "[\"Trucks\"]",
        ])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("query: start datasets=items params=1 limit_appended=true"));
    assert!(stdout.contains("unique_id | hammer\n"));
    assert!(stdout.contains("A1 | 18,000.00\n"));
}

#[test]
fn report_schema_prints_record_schema() {
    let temp = unique_temp_dir("bidlens-exit-schema");
    let output = bidlens(&temp)
        .args(["report", "schema"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"report_type\""));
}

//! Shared harness: provisions an isolated, migrated Postgres database per
//! test. The environment has no container runtime, so instead of a
//! testcontainers image this boots one local Postgres 15 cluster (from the
//! system binaries) on a unix socket under /tmp and hands every `setup`
//! call its own freshly created database — the same isolation the
//! one-container-per-test version provided.

use std::os::unix::fs::MetadataExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, Ordering};

use kingdom_battles::{BattleConfig, BattleEngine, db};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool};

/// Cluster home. Left in place between binaries and runs; a later probe
/// finds the server already listening and skips the boot.
const BASE: &str = "/tmp/kingdom-battles-test-pg";

static SERVER: Once = Once::new();
static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Keep-alive handle for the per-test database, standing in for the
/// container guard the testcontainers version returned. Databases are not
/// dropped afterwards; the whole cluster is throwaway.
pub struct TestDb {
    #[allow(dead_code)]
    pub dbname: String,
}

pub async fn setup() -> (PgPool, TestDb) {
    SERVER.call_once(ensure_server);

    let dbname = format!(
        "kb_test_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let mut admin = PgConnection::connect_with(&connect_opts("postgres"))
        .await
        .expect("connect to maintenance database");
    sqlx::raw_sql(&format!("CREATE DATABASE {dbname}"))
        .execute(&mut admin)
        .await
        .expect("create test database");
    admin.close().await.ok();

    let pool = PgPoolOptions::new()
        .connect_with(connect_opts(&dbname))
        .await
        .unwrap();
    db::migrate(&pool).await.unwrap();
    (pool, TestDb { dbname })
}

pub fn engine(pool: &PgPool) -> BattleEngine {
    BattleEngine::new(pool.clone(), BattleConfig::default())
}

fn connect_opts(dbname: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .socket(Path::new(BASE).join("sock"))
        .username("postgres")
        .database(dbname)
}

/// Boot the shared cluster unless something is already answering on its
/// socket. Postgres refuses to run as root, so when the tests run as root
/// every server command is re-credentialed to the `postgres` system user.
fn ensure_server() {
    let base = Path::new(BASE);
    let sock_dir = base.join("sock");
    let data_dir = base.join("data");

    if std::os::unix::net::UnixStream::connect(sock_dir.join(".s.PGSQL.5432")).is_ok() {
        return;
    }

    std::fs::create_dir_all(&sock_dir).expect("create socket dir");
    let owner = server_owner();
    if let Some((uid, gid)) = owner {
        for dir in [base, &sock_dir] {
            std::os::unix::fs::chown(dir, Some(uid), Some(gid)).expect("chown cluster dir");
        }
    }

    if !data_dir.join("PG_VERSION").exists() {
        let _ = std::fs::remove_dir_all(&data_dir);
        run(
            owner,
            base,
            Command::new("/usr/local/bin/initdb").args([
                "-D".as_ref(),
                data_dir.as_os_str(),
                "-U".as_ref(),
                "postgres".as_ref(),
                "-A".as_ref(),
                "trust".as_ref(),
                "--no-sync".as_ref(),
            ]),
        );
    }

    run(
        owner,
        base,
        Command::new("/usr/local/bin/pg_ctl").args([
            "-D".as_ref(),
            data_dir.as_os_str(),
            "-l".as_ref(),
            base.join("postgres.log").as_os_str(),
            "-o".as_ref(),
            format!(
                "-c listen_addresses='' -k {} -c fsync=off",
                sock_dir.display()
            )
            .as_ref(),
            "-w".as_ref(),
            "start".as_ref(),
        ]),
    );
}

/// Credentials to run the server under: the `postgres` system user when we
/// are root, otherwise the current user is fine as-is.
fn server_owner() -> Option<(u32, u32)> {
    let euid = std::fs::metadata("/proc/self").map(|m| m.uid()).unwrap_or(0);
    if euid != 0 {
        return None;
    }
    let passwd = std::fs::read_to_string("/etc/passwd").expect("read /etc/passwd");
    let line = passwd
        .lines()
        .find(|l| l.starts_with("postgres:"))
        .expect("postgres system user (postgres cannot run as root)");
    let mut fields = line.split(':').skip(2);
    let uid = fields.next().unwrap().parse().unwrap();
    let gid = fields.next().unwrap().parse().unwrap();
    Some((uid, gid))
}

fn run(owner: Option<(u32, u32)>, cwd: &Path, cmd: &mut Command) {
    let program = PathBuf::from(cmd.get_program());
    cmd.current_dir(cwd);
    if let Some((uid, gid)) = owner {
        cmd.uid(uid).gid(gid);
    }
    let output = cmd.output().expect("spawn postgres command");
    if !output.status.success() {
        panic!(
            "{} failed ({}):\n{}\n{}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

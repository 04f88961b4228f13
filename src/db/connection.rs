use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type StoreJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(StoreJob),
    Stop,
}

/// The thread that owns the connection. Dropping the last `Database` clone
/// stops it after queued jobs have run.
struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(Message::Stop).is_err() {
            error!("Record store worker already gone at shutdown");
        }
        if handle.join().is_err() {
            error!("Record store worker panicked");
        }
    }
}

/// Handle to the file-record store.
///
/// One worker thread owns the SQLite connection and runs submitted closures
/// in order, so every write through any clone of this handle is serialised.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL journal unavailable, keeping default journal: {err}");
    }
    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(mut conn: Connection, jobs: mpsc::Receiver<Message>) {
    for message in jobs {
        match message {
            Message::Run(job) => job(&mut conn),
            Message::Stop => break,
        }
    }
    info!("Record store worker stopped");
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<Message>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_path = db_path.clone();

        let thread = thread::Builder::new()
            .name("fileorg-db".into())
            .spawn(move || match open_connection(&worker_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, jobs_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn record store worker")?;

        ready_rx
            .recv()
            .context("record store worker exited during startup")??;

        info!("Record store ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Run `task` on the worker thread and await its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: StoreJob = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                warn!("Record store caller went away before its reply");
            }
        });

        self.worker
            .jobs
            .send(Message::Run(job))
            .map_err(|_| anyhow!("record store worker is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("record store worker dropped a job"))?
    }
}

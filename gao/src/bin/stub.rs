//! gao-stub - reference sandbox subprocess.
//!
//! Speaks the Gao line protocol on stdin/stdout against a single in-memory
//! sandbox slot. It enforces no isolation; it exists to drive the client end
//! to end. Diagnostics go to stderr because stdout is the channel.

use clap::Parser;
use gao::{LoggingOptions, init_logging};
use gao_shared::wire::{Command, Response};
use gao_shared::{GaoletteId, PerfSpec};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "gao-stub", about = "Reference subprocess for the Gao protocol")]
struct Args {
    /// Exit status once the channel reaches end of input.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    exit_code: i32,

    /// Answer every create request with ERR:<code>.
    #[arg(long, allow_negative_numbers = true)]
    fail_create: Option<i32>,

    /// Answer every state query with OK:<code>, mapped or not.
    #[arg(long, allow_negative_numbers = true)]
    report_state: Option<i64>,

    /// Write diagnostics to daily log files here instead of stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Error codes, matching the client's creation taxonomy.
const ERR_INVALID: i32 = 1;
const ERR_NO_RESOURCES: i32 = 2;
const ERR_UNKNOWN: i32 = -1;

struct Slot {
    id: GaoletteId,
    spec: PerfSpec,
}

struct Stub {
    args: Args,
    next_id: GaoletteId,
    live: Option<Slot>,
}

impl Stub {
    fn new(args: Args) -> Self {
        Self {
            args,
            next_id: 1,
            live: None,
        }
    }

    fn handle(&mut self, line: &str) -> Response {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(line = %line, error = %e, "Unparsable request");
                return Response::Err(ERR_UNKNOWN);
            }
        };

        match command {
            Command::Create(spec) => self.create(spec),
            Command::Destroy(id) => self.destroy(id),
            Command::QueryState => self.query_state(),
        }
    }

    fn create(&mut self, spec: PerfSpec) -> Response {
        if let Some(code) = self.args.fail_create {
            return Response::Err(code);
        }
        if self.live.is_some() {
            return Response::Err(ERR_NO_RESOURCES);
        }
        if spec.total_bytes == 0 || spec.max_cpu_cores == 0 {
            return Response::Err(ERR_INVALID);
        }

        let id = self.next_id;
        self.next_id += 1;
        tracing::info!(gaolette_id = id, spec = ?spec, "Created gaolette");
        self.live = Some(Slot { id, spec });
        Response::Ok(id.to_string())
    }

    fn destroy(&mut self, id: GaoletteId) -> Response {
        match self.live.take() {
            Some(slot) if slot.id == id => {
                tracing::info!(gaolette_id = id, total_bytes = slot.spec.total_bytes, "Destroyed gaolette");
                Response::Ok(String::new())
            }
            other => {
                self.live = other;
                Response::Err(ERR_INVALID)
            }
        }
    }

    fn query_state(&self) -> Response {
        if let Some(code) = self.args.report_state {
            return Response::Ok(code.to_string());
        }
        match self.live {
            // Operational
            Some(_) => Response::Ok("0".to_string()),
            None => Response::Err(ERR_INVALID),
        }
    }
}

/// Logging problems are reported on stderr and never stop the stub: stdout
/// is the channel and must keep answering.
fn setup_logging(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let options = LoggingOptions {
        default_directive: "warn".to_string(),
        log_dir,
        ..Default::default()
    };
    match init_logging(&options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("gao-stub: logging disabled: {}", e);
            None
        }
    }
}

fn main() {
    let args = Args::parse();
    let _guard = setup_logging(args.log_dir.clone());

    let exit_code = args.exit_code;
    let mut stub = Stub::new(args);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read request");
                break;
            }
        };

        let response = stub.handle(&line);
        if let Err(e) = writeln!(stdout, "{}", response.encode()).and_then(|_| stdout.flush()) {
            tracing::error!(error = %e, "Failed to write response");
            break;
        }
    }

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_log_dir_disables_logging() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(setup_logging(Some(file.path().join("logs"))).is_none());
    }

    #[test]
    fn test_single_slot() {
        let mut stub = Stub::new(Args::parse_from(["gao-stub"]));
        assert_eq!(stub.handle("crt:1024,0,1024,1"), Response::Ok("1".into()));
        assert_eq!(stub.handle("crt:1024,0,1024,1"), Response::Err(ERR_NO_RESOURCES));
        assert_eq!(stub.handle("get:state"), Response::Ok("0".into()));
        assert_eq!(stub.handle("del:2"), Response::Err(ERR_INVALID));
        assert_eq!(stub.handle("del:1"), Response::Ok(String::new()));
        assert_eq!(stub.handle("get:state"), Response::Err(ERR_INVALID));
        assert_eq!(stub.handle("bogus"), Response::Err(ERR_UNKNOWN));
    }
}

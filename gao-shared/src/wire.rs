//! Line grammar spoken over the channel.
//!
//! Requests:
//!
//! ```text
//! crt:<total_bytes>,<policy 0|1>,<max_memory_bytes>,<max_cpu_cores>
//! del:<id>
//! get:state
//! ```
//!
//! Responses are `OK:<payload>` or `ERR:<code>`. Lines are ASCII and carry
//! no trailing newline here; framing belongs to the channel.

use crate::errors::{GaoError, GaoResult};
use crate::types::{GaoletteId, GaoletteState, MemoryPolicy, PerfSpec};

const CREATE_PREFIX: &str = "crt:";
const DESTROY_PREFIX: &str = "del:";
const QUERY_STATE: &str = "get:state";

const OK_PREFIX: &str = "OK";
const ERR_PREFIX: &str = "ERR";
const DELIMITER: char = ':';

/// A request line sent to the subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create(PerfSpec),
    Destroy(GaoletteId),
    QueryState,
}

impl Command {
    pub fn encode(&self) -> String {
        match self {
            Command::Create(spec) => format!(
                "{}{},{},{},{}",
                CREATE_PREFIX,
                spec.total_bytes,
                spec.memory_policy.code(),
                spec.max_memory_bytes,
                spec.max_cpu_cores
            ),
            Command::Destroy(id) => format!("{}{}", DESTROY_PREFIX, id),
            Command::QueryState => QUERY_STATE.to_string(),
        }
    }

    /// Parses a request line. Used by subprocess implementations.
    pub fn parse(line: &str) -> GaoResult<Self> {
        if line == QUERY_STATE {
            return Ok(Command::QueryState);
        }

        if let Some(id) = line.strip_prefix(DESTROY_PREFIX) {
            let id = id
                .parse::<GaoletteId>()
                .map_err(|e| GaoError::Protocol(format!("bad gaolette id {:?}: {}", id, e)))?;
            return Ok(Command::Destroy(id));
        }

        if let Some(fields) = line.strip_prefix(CREATE_PREFIX) {
            return parse_create_fields(fields).map(Command::Create);
        }

        Err(GaoError::Protocol(format!("unknown command {:?}", line)))
    }
}

fn parse_create_fields(fields: &str) -> GaoResult<PerfSpec> {
    let parts: Vec<&str> = fields.split(',').collect();
    let &[total, policy, max_memory, max_cpu] = parts.as_slice() else {
        return Err(GaoError::Protocol(format!(
            "create expects 4 fields, got {}",
            parts.len()
        )));
    };

    let field = |name: &str, value: &str| {
        value
            .parse::<u64>()
            .map_err(|e| GaoError::Protocol(format!("bad {} {:?}: {}", name, value, e)))
    };

    let memory_policy = policy
        .parse::<u8>()
        .ok()
        .and_then(MemoryPolicy::from_code)
        .ok_or_else(|| GaoError::Protocol(format!("bad memory policy {:?}", policy)))?;

    let max_cpu_cores = u32::try_from(field("max_cpu_cores", max_cpu)?)
        .map_err(|_| GaoError::Protocol(format!("max_cpu_cores out of range: {}", max_cpu)))?;

    Ok(PerfSpec {
        total_bytes: field("total_bytes", total)?,
        memory_policy,
        max_memory_bytes: field("max_memory_bytes", max_memory)?,
        max_cpu_cores,
    })
}

/// A decoded response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success with its command-specific payload (may be empty).
    Ok(String),
    /// Failure with its numeric code.
    Err(i32),
}

impl Response {
    /// Decodes a response line.
    ///
    /// Success iff the line starts with `OK`; the payload is everything after
    /// the first `:` (empty when there is none). Failure iff it starts with
    /// `ERR`; the code after the `:` must be an integer. Anything else,
    /// including an empty line, is a protocol violation.
    pub fn decode(line: &str) -> GaoResult<Self> {
        if line.is_empty() {
            return Err(GaoError::Protocol("empty response".into()));
        }

        if line.starts_with(OK_PREFIX) {
            let payload = line
                .split_once(DELIMITER)
                .map(|(_, payload)| payload)
                .unwrap_or("");
            return Ok(Response::Ok(payload.to_string()));
        }

        if line.starts_with(ERR_PREFIX) {
            let code = line
                .split_once(DELIMITER)
                .map(|(_, code)| code)
                .ok_or_else(|| GaoError::Protocol(format!("error response without code: {:?}", line)))?;
            let code = code
                .parse::<i32>()
                .map_err(|e| GaoError::Protocol(format!("bad error code {:?}: {}", code, e)))?;
            return Ok(Response::Err(code));
        }

        Err(GaoError::Protocol(format!("unrecognized response {:?}", line)))
    }

    pub fn encode(&self) -> String {
        match self {
            Response::Ok(payload) => format!("{}{}{}", OK_PREFIX, DELIMITER, payload),
            Response::Err(code) => format!("{}{}{}", ERR_PREFIX, DELIMITER, code),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

/// Interprets the reply to a create request.
///
/// An empty reply or one starting with `-1` is an outright rejection, never an
/// `ERR` classification.
pub fn parse_create_reply(line: &str) -> GaoResult<GaoletteId> {
    if line.is_empty() {
        return Err(GaoError::CreationRejected("empty response".into()));
    }
    if line.starts_with("-1") {
        return Err(GaoError::CreationRejected(format!("subprocess replied {:?}", line)));
    }

    match Response::decode(line)? {
        Response::Err(code) => Err(GaoError::creation(code)),
        Response::Ok(payload) => {
            let id = payload.parse::<GaoletteId>().map_err(|e| {
                GaoError::Protocol(format!("bad gaolette id {:?}: {}", payload, e))
            })?;
            if id < 0 {
                return Err(GaoError::Protocol(format!(
                    "subprocess assigned negative gaolette id {}",
                    id
                )));
            }
            Ok(id)
        }
    }
}

/// Interprets the reply to a state query.
pub fn parse_state_reply(line: &str) -> GaoResult<GaoletteState> {
    match Response::decode(line)? {
        Response::Ok(payload) => {
            let code = payload
                .parse::<i64>()
                .map_err(|e| GaoError::Protocol(format!("bad state code {:?}: {}", payload, e)))?;
            GaoletteState::from_code(code)
                .ok_or_else(|| GaoError::Protocol(format!("unknown state code {}", code)))
        }
        Response::Err(code) => Err(GaoError::OperationFailed(format!(
            "state query rejected with code {}",
            code
        ))),
    }
}

/// Whether a reply acknowledges a destroy request. Anything but `OK` is a refusal.
pub fn is_destroy_ack(line: &str) -> bool {
    line.starts_with(OK_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CreationFailure;

    #[test]
    fn test_encode_commands() {
        let spec = PerfSpec::new(1024, MemoryPolicy::Dynamic)
            .with_max_memory_bytes(2048)
            .with_max_cpu_cores(4);
        assert_eq!(Command::Create(spec).encode(), "crt:1024,1,2048,4");
        assert_eq!(Command::Destroy(7).encode(), "del:7");
        assert_eq!(Command::QueryState.encode(), "get:state");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("crt:64,0,32,2").unwrap(),
            Command::Create(
                PerfSpec::new(64, MemoryPolicy::Static)
                    .with_max_memory_bytes(32)
                    .with_max_cpu_cores(2)
            )
        );
        assert_eq!(Command::parse("del:12").unwrap(), Command::Destroy(12));
        assert_eq!(Command::parse("get:state").unwrap(), Command::QueryState);
    }

    #[test]
    fn test_parse_rejects_malformed_commands() {
        assert!(Command::parse("crt:1,2,3").is_err());
        assert!(Command::parse("crt:1,5,3,4").is_err());
        assert!(Command::parse("crt:a,0,3,4").is_err());
        assert!(Command::parse("del:").is_err());
        assert!(Command::parse("get:status").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn test_decode_ok_takes_payload_after_first_delimiter() {
        assert_eq!(Response::decode("OK:42").unwrap(), Response::Ok("42".into()));
        assert_eq!(Response::decode("OK:a:b").unwrap(), Response::Ok("a:b".into()));
        assert_eq!(Response::decode("OK").unwrap(), Response::Ok(String::new()));
    }

    #[test]
    fn test_decode_err() {
        assert_eq!(Response::decode("ERR:3").unwrap(), Response::Err(3));
        assert!(Response::decode("ERR").unwrap_err().is_protocol_violation());
        assert!(Response::decode("ERR:x").unwrap_err().is_protocol_violation());
    }

    #[test]
    fn test_decode_never_defaults() {
        assert!(Response::decode("").unwrap_err().is_protocol_violation());
        assert!(Response::decode("0").unwrap_err().is_protocol_violation());
        assert!(Response::decode("ok:1").unwrap_err().is_protocol_violation());
    }

    #[test]
    fn test_create_reply_ok() {
        assert_eq!(parse_create_reply("OK:42").unwrap(), 42);
    }

    #[test]
    fn test_create_reply_err_is_classified() {
        match parse_create_reply("ERR:2").unwrap_err() {
            GaoError::Creation { code, failure } => {
                assert_eq!(code, 2);
                assert_eq!(failure, CreationFailure::InsufficientResources);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_reply_empty_or_minus_one_is_generic() {
        assert!(matches!(
            parse_create_reply("").unwrap_err(),
            GaoError::CreationRejected(_)
        ));
        assert!(matches!(
            parse_create_reply("-1").unwrap_err(),
            GaoError::CreationRejected(_)
        ));
        assert!(matches!(
            parse_create_reply("-1:whatever").unwrap_err(),
            GaoError::CreationRejected(_)
        ));
    }

    #[test]
    fn test_create_reply_garbage_is_protocol_violation() {
        assert!(parse_create_reply("hello").unwrap_err().is_protocol_violation());
        assert!(parse_create_reply("OK:abc").unwrap_err().is_protocol_violation());
        assert!(parse_create_reply("OK:-4").unwrap_err().is_protocol_violation());
    }

    #[test]
    fn test_state_reply() {
        assert_eq!(parse_state_reply("OK:0").unwrap(), GaoletteState::Operational);
        assert_eq!(parse_state_reply("OK:4").unwrap(), GaoletteState::Illformed);
        assert!(parse_state_reply("OK:9").unwrap_err().is_protocol_violation());
        assert!(parse_state_reply("nope").unwrap_err().is_protocol_violation());
        assert!(matches!(
            parse_state_reply("ERR:1").unwrap_err(),
            GaoError::OperationFailed(_)
        ));
    }

    #[test]
    fn test_destroy_ack() {
        assert!(is_destroy_ack("OK"));
        assert!(is_destroy_ack("OK:"));
        assert!(!is_destroy_ack("ERR:1"));
        assert!(!is_destroy_ack(""));
    }

    #[test]
    fn test_response_encode() {
        assert_eq!(Response::Ok("3".into()).encode(), "OK:3");
        assert_eq!(Response::Err(-1).encode(), "ERR:-1");
    }
}

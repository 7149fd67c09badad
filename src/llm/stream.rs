use crate::error::{Error, Result};
use std::io::BufRead;

/// What one line of a streaming response means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of the generated text.
    Delta(String),
    /// Keep-alives, role-only chunks and other lines without text.
    Skip,
    /// The backend's terminal signal.
    Done,
}

/// Fold a sequence of stream events into one text.
///
/// Empty deltas are skipped. The sequence must reach `Done`: if it runs out
/// first, or any event is an error, `on_complete` is never called.
pub fn accumulate<I>(
    backend: &'static str,
    events: I,
    on_delta: &mut dyn FnMut(&str),
    on_complete: Box<dyn FnOnce(String) + '_>,
) -> Result<()>
where
    I: IntoIterator<Item = Result<StreamEvent>>,
{
    let mut out = String::new();

    for event in events {
        match event? {
            StreamEvent::Delta(chunk) if chunk.is_empty() => {}
            StreamEvent::Delta(chunk) => {
                on_delta(&chunk);
                out.push_str(&chunk);
            }
            StreamEvent::Skip => {}
            StreamEvent::Done => {
                on_complete(out);
                return Ok(());
            }
        }
    }

    Err(Error::Stream {
        backend,
        message: "stream ended before completion".into(),
    })
}

/// Text of an error object a backend sent inside a stream: either a bare
/// string or an object with a `message` field.
pub fn error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Read a streaming response line-by-line, handing each parsed chunk to
/// `on_delta` as it arrives. Lines after the terminal signal are not read.
pub fn read_stream<R, F>(
    backend: &'static str,
    reader: R,
    mut parse_line: F,
    on_delta: &mut dyn FnMut(&str),
    on_complete: Box<dyn FnOnce(String) + '_>,
) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str) -> Result<StreamEvent>,
{
    let events = reader.lines().filter_map(move |line| {
        let line = match line {
            Ok(line) => line,
            Err(source) => return Some(Err(Error::StreamRead { backend, source })),
        };
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(parse_line(line))
    });

    accumulate(backend, events, on_delta, on_complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::{self, Cursor, Read};

    fn deltas(parts: &[&str]) -> Vec<Result<StreamEvent>> {
        parts
            .iter()
            .map(|s| Ok(StreamEvent::Delta(s.to_string())))
            .collect()
    }

    #[test]
    fn empty_fragments_are_skipped() {
        let mut events = deltas(&["Hello", "", " world"]);
        events.push(Ok(StreamEvent::Skip));
        events.extend(deltas(&["!"]));
        events.push(Ok(StreamEvent::Done));

        let mut seen = Vec::new();
        let completed = RefCell::new(Vec::new());
        accumulate(
            "test",
            events,
            &mut |d| seen.push(d.to_string()),
            Box::new(|full| completed.borrow_mut().push(full)),
        )
        .unwrap();

        assert_eq!(seen, vec!["Hello", " world", "!"]);
        assert_eq!(completed.into_inner(), vec!["Hello world!".to_string()]);
    }

    #[test]
    fn failure_mid_stream_skips_completion() {
        let events = vec![
            Ok(StreamEvent::Delta("partial".to_string())),
            Err(Error::decode("OpenAI", "bad chunk")),
            Ok(StreamEvent::Delta("never".to_string())),
            Ok(StreamEvent::Done),
        ];

        let mut seen = Vec::new();
        let mut completed = false;
        let err = accumulate(
            "OpenAI",
            events,
            &mut |d| seen.push(d.to_string()),
            Box::new(|_| completed = true),
        )
        .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(seen, vec!["partial"]);
        assert!(!completed);
    }

    #[test]
    fn sequence_without_done_is_a_stream_error() {
        let mut seen = Vec::new();
        let mut completed = false;
        let err = accumulate(
            "Ollama",
            deltas(&["fix: ", "half"]),
            &mut |d| seen.push(d.to_string()),
            Box::new(|_| completed = true),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Stream { backend: "Ollama", .. }));
        assert!(err.is_transport());
        assert_eq!(seen, vec!["fix: ", "half"]);
        assert!(!completed);
    }

    #[test]
    fn events_after_done_are_ignored() {
        let mut events = deltas(&["a"]);
        events.push(Ok(StreamEvent::Done));
        events.extend(deltas(&["b"]));
        events.push(Err(Error::decode("test", "trailing garbage")));

        let mut full = String::new();
        accumulate("test", events, &mut |_| {}, Box::new(|text| full = text)).unwrap();

        assert_eq!(full, "a");
    }

    #[test]
    fn blank_lines_never_reach_the_parser() {
        let body = "a\n\n   \nb\nend\n";
        let mut seen = Vec::new();
        let mut full = String::new();
        read_stream(
            "test",
            Cursor::new(body),
            |line| {
                seen.push(line.to_string());
                Ok(match line {
                    "end" => StreamEvent::Done,
                    _ => StreamEvent::Delta(line.to_uppercase()),
                })
            },
            &mut |_| {},
            Box::new(|text| full = text),
        )
        .unwrap();

        assert_eq!(seen, vec!["a", "b", "end"]);
        assert_eq!(full, "AB");
    }

    #[test]
    fn error_message_prefers_the_message_field() {
        let nested = serde_json::json!({"message": "overloaded", "type": "server_error"});
        assert_eq!(error_message(&nested), "overloaded");
        assert_eq!(error_message(&serde_json::json!("runner stopped")), "runner stopped");
        assert_eq!(error_message(&serde_json::json!({"code": 7})), "{\"code\":7}");
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn read_errors_are_transport_failures() {
        let mut completed = false;
        let err = read_stream(
            "test",
            io::BufReader::new(Broken),
            |line| Ok(StreamEvent::Delta(line.to_string())),
            &mut |_| {},
            Box::new(|_| completed = true),
        )
        .unwrap_err();

        assert!(matches!(err, Error::StreamRead { .. }));
        assert!(!completed);
    }
}

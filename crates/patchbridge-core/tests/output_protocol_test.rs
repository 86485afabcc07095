use patchbridge_core::{
    DiagnosticChannel, LineKind, MemorySurface, OutputBuffer, SeekMode, SessionContext, Severity,
};

#[derive(Debug, Clone, Copy)]
enum Step {
    Write(&'static [u8]),
    Seek(SeekMode, i64),
}

/// Replays a guest's write/seek sequence: once counting, once writing.
fn run_two_passes(steps: &[Step]) -> OutputBuffer {
    let mut output = OutputBuffer::new();
    for step in steps {
        match *step {
            Step::Write(bytes) => {
                output.count_write(bytes.len() as u64);
            }
            Step::Seek(mode, offset) => {
                output.seek(mode, offset);
            }
        }
    }

    output.restart();
    output.seek(SeekMode::Absolute, 0);
    for step in steps {
        match *step {
            Step::Write(bytes) => {
                output.write(bytes).unwrap();
            }
            Step::Seek(mode, offset) => {
                output.seek(mode, offset);
            }
        }
    }
    output
}

#[test]
fn discovered_length_is_max_cursor_reached() {
    let steps = [
        Step::Write(b"0123456789"),
        Step::Seek(SeekMode::Relative, -6),
        Step::Write(b"ab"),
        Step::Seek(SeekMode::Absolute, 40),
        Step::Write(b"xyz"),
        Step::Seek(SeekMode::FromEnd, 20),
        Step::Write(b"q"),
    ];

    let mut output = OutputBuffer::new();
    let mut max_cursor = 0;
    for step in steps {
        match step {
            Step::Write(bytes) => {
                output.count_write(bytes.len() as u64);
                max_cursor = max_cursor.max(output.cursor());
            }
            Step::Seek(mode, offset) => {
                output.seek(mode, offset);
            }
        }
    }

    assert_eq!(max_cursor, 43);
    assert_eq!(output.discovered_length(), max_cursor as u64);
}

#[test]
fn sparse_writes_materialize_with_zero_gap() {
    let output = run_two_passes(&[
        Step::Write(b"HEAD"),
        Step::Seek(SeekMode::Absolute, 100),
        Step::Write(b"TAIL"),
    ]);

    assert_eq!(output.discovered_length(), 104);
    let bytes = output.into_bytes().unwrap();
    assert_eq!(bytes.len(), 104);
    assert_eq!(&bytes[..4], b"HEAD");
    assert!(bytes[4..100].iter().all(|&b| b == 0));
    assert_eq!(&bytes[100..], b"TAIL");
}

#[test]
fn replay_with_backpatch_fills_whole_buffer() {
    // Header placeholder, body, then seek back and patch the header.
    let output = run_two_passes(&[
        Step::Write(b"????"),
        Step::Write(b"body-bytes"),
        Step::Seek(SeekMode::Absolute, 0),
        Step::Write(b"SIZE"),
        Step::Seek(SeekMode::FromEnd, 0),
    ]);

    assert_eq!(output.cursor(), 14);
    assert_eq!(output.into_bytes().unwrap(), b"SIZEbody-bytes");
}

#[test]
fn seek_from_end_is_exact_subtraction() {
    let mut output = OutputBuffer::new();
    output.count_write(10);
    for k in [0, 3, 10, 11, 1_000] {
        assert_eq!(output.seek(SeekMode::FromEnd, k), 10 - k);
    }
}

#[test]
fn session_reports_errors_as_banner_and_chain() {
    let surface = MemorySurface::new();
    let mut session =
        SessionContext::new("RomHack", DiagnosticChannel::new(Box::new(surface.clone())));

    session
        .diagnostics_mut()
        .render_line("Opening", "Patch", Severity::Normal);
    session.diagnostics_mut().report_error("Couldn't build the ISO");
    session.diagnostics_mut().report_error("Couldn't find main.dol");
    session.diagnostics_mut().report_error("No such entry");

    let lines = surface.lines();
    assert_eq!(lines[0].kind, LineKind::Entry(Severity::Normal));
    assert_eq!(lines[1].kind, LineKind::Banner);
    assert_eq!(lines[2].key, "Caused by");
    assert_eq!(lines[3].key, "Caused by");
    assert_eq!(session.error_count(), 3);
}

//! Where rendered packets go.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Packet;

/// Sink for rendered output.
///
/// `is_final` marks the last packet of a response; error pages are always
/// final.
pub trait Transport {
    fn send_dump(&mut self, packet: &Packet, is_final: bool) -> io::Result<()>;

    fn send_error(&mut self, packet: &Packet, is_final: bool) -> io::Result<()>;

    /// Deliver anything still held back. Called once no final packet is
    /// coming.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_dump(&mut self, packet: &Packet, is_final: bool) -> io::Result<()> {
        (**self).send_dump(packet, is_final)
    }

    fn send_error(&mut self, packet: &Packet, is_final: bool) -> io::Result<()> {
        (**self).send_error(packet, is_final)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Writes bodies to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutTransport;

impl StdoutTransport {
    fn write(packet: &Packet) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(packet.body.as_bytes())?;
        out.flush()
    }
}

impl Transport for StdoutTransport {
    fn send_dump(&mut self, packet: &Packet, _is_final: bool) -> io::Result<()> {
        Self::write(packet)
    }

    fn send_error(&mut self, packet: &Packet, _is_final: bool) -> io::Result<()> {
        Self::write(packet)
    }
}

const NO_CACHE: &[u8] =
    b"Cache-Control: no-cache, no-store, must-revalidate\r\nPragma: no-cache\r\nExpires: 0\r\n";

/// Writes one HTTP/1.1 response per connection.
///
/// Non-final packets are held back. The final packet becomes the response
/// body with the held fragments placed at the start of its `<body>` (or in
/// front of it for non-HTML output), so the client receives one document.
/// A dump answers `200 OK`, an error `500 Internal Server Error`, and a
/// final packet adds headers that stop clients from caching the response.
///
/// Fragments with no final packet after them go out as a plain `200 OK` on
/// [`finish`](Transport::finish) or drop.
#[derive(Debug)]
pub struct HttpTransport<W: Write> {
    writer: W,
    pending: String,
    pending_type: Option<&'static str>,
    finished: bool,
}

impl<W: Write> HttpTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: String::new(),
            pending_type: None,
            finished: false,
        }
    }

    /// Whether the response has been written.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    fn send(&mut self, status: &str, packet: &Packet, is_final: bool) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::other("response already sent"));
        }
        if !is_final {
            self.pending.push_str(&packet.body);
            self.pending_type.get_or_insert(packet.content_type);
            tracing::trace!(bytes = packet.body.len(), "holding packet until the final one");
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        let body = splice(&pending, &packet.body);
        self.respond(status, packet.content_type, &body, true)
    }

    fn respond(&mut self, status: &str, content_type: &str, body: &str, no_cache: bool) -> io::Result<()> {
        self.finished = true;
        write!(self.writer, "HTTP/1.1 {status}\r\n")?;
        write!(self.writer, "Content-Type: {content_type}\r\n")?;
        if no_cache {
            self.writer.write_all(NO_CACHE)?;
        }
        write!(self.writer, "Content-Length: {}\r\n\r\n", body.len())?;
        self.writer.write_all(body.as_bytes())?;
        self.writer.flush()
    }
}

/// `fragments` right after the opening `<body>` tag of `document`, or in
/// front of it when there is none.
fn splice(fragments: &str, document: &str) -> String {
    let insert_at = document
        .find("<body")
        .and_then(|start| document.get(start..)?.find('>').map(|end| start + end + 1));
    match insert_at {
        Some(idx) => {
            let (head, tail) = document.split_at(idx);
            format!("{head}{fragments}{tail}")
        }
        None => format!("{fragments}{document}"),
    }
}

impl<W: Write> Transport for HttpTransport<W> {
    fn send_dump(&mut self, packet: &Packet, is_final: bool) -> io::Result<()> {
        self.send("200 OK", packet, is_final)
    }

    fn send_error(&mut self, packet: &Packet, is_final: bool) -> io::Result<()> {
        self.send("500 Internal Server Error", packet, is_final)
    }

    fn finish(&mut self) -> io::Result<()> {
        let Some(content_type) = self.pending_type.filter(|_| !self.finished) else {
            return Ok(());
        };
        let pending = std::mem::take(&mut self.pending);
        self.respond("200 OK", content_type, &pending, false)
    }
}

impl<W: Write> Drop for HttpTransport<W> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            tracing::warn!(%err, "failed to send held-back response");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    Dump,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub kind: SentKind,
    pub packet: Packet,
    pub is_final: bool,
}

/// Collects packets in memory. Clones share the same buffer, so a clone kept
/// outside a [`Context`](crate::Context) sees what the context sent.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    /// Bodies of everything sent so far, in order.
    pub fn bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|sent| sent.packet.body.clone())
            .collect()
    }

    fn push(&self, kind: SentKind, packet: &Packet, is_final: bool) {
        self.sent.lock().push(Sent {
            kind,
            packet: packet.clone(),
            is_final,
        });
    }
}

impl Transport for MemoryTransport {
    fn send_dump(&mut self, packet: &Packet, is_final: bool) -> io::Result<()> {
        self.push(SentKind::Dump, packet, is_final);
        Ok(())
    }

    fn send_error(&mut self, packet: &Packet, is_final: bool) -> io::Result<()> {
        self.push(SentKind::Error, packet, is_final);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(body: &str) -> Packet {
        Packet {
            body: body.to_owned(),
            content_type: "text/html; charset=utf-8",
        }
    }

    fn text_packet(body: &str) -> Packet {
        Packet {
            body: body.to_owned(),
            content_type: "text/plain; charset=utf-8",
        }
    }

    #[test]
    fn test_http_fragments_land_inside_final_document() {
        let mut out = Vec::new();
        {
            let mut http = HttpTransport::new(&mut out);
            http.send_dump(&packet("<iframe>1</iframe>"), false).unwrap();
            http.send_dump(&packet("<iframe>2</iframe>"), false).unwrap();
            assert!(!http.is_finished());
            http.send_error(
                &packet("<!DOCTYPE html>\n<html><body class=\"x\"><p>oops</p></body></html>\n"),
                true,
            )
            .unwrap();
            assert!(http.is_finished());
        }

        let out = String::from_utf8(out).unwrap();
        let (head, body) = out.split_once("\r\n\r\n").unwrap();
        assert_eq!(
            head,
            "HTTP/1.1 500 Internal Server Error\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             Cache-Control: no-cache, no-store, must-revalidate\r\n\
             Pragma: no-cache\r\n\
             Expires: 0\r\n\
             Content-Length: 100"
        );
        assert_eq!(
            body,
            "<!DOCTYPE html>\n<html><body class=\"x\"><iframe>1</iframe><iframe>2</iframe><p>oops</p></body></html>\n"
        );
        assert_eq!(body.matches("<!DOCTYPE").count(), 1);
    }

    #[test]
    fn test_http_final_error() {
        let mut out = Vec::new();
        HttpTransport::new(&mut out).send_error(&text_packet("oops"), true).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(out.contains("Cache-Control: no-cache, no-store, must-revalidate\r\n"));
        assert!(out.contains("Content-Length: 4\r\n"));
        assert!(out.ends_with("\r\n\r\noops"));
    }

    #[test]
    fn test_http_text_fragments_prefix_final_body() {
        let mut out = Vec::new();
        {
            let mut http = HttpTransport::new(&mut out);
            http.send_dump(&text_packet("1\n"), false).unwrap();
            http.send_dump(&text_packet("done\n"), true).unwrap();
            let err = http.send_dump(&text_packet("late\n"), false).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Other);
        }

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Pragma: no-cache\r\n"));
        assert!(out.ends_with("Content-Length: 7\r\n\r\n1\ndone\n"));
    }

    #[test]
    fn test_http_unfinished_fragments_sent_on_drop() {
        let mut out = Vec::new();
        {
            let mut http = HttpTransport::new(&mut out);
            http.send_dump(&packet("<p>1</p>"), false).unwrap();
            http.send_dump(&packet("<p>2</p>"), false).unwrap();
        }

        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 16\r\n\r\n<p>1</p><p>2</p>"
        );
    }

    #[test]
    fn test_http_nothing_sent_writes_nothing() {
        let mut out = Vec::new();
        HttpTransport::new(&mut out).finish().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_memory_clones_share_buffer() {
        let memory = MemoryTransport::new();
        let mut boxed: Box<dyn Transport> = Box::new(memory.clone());
        boxed.send_dump(&packet("a"), false).unwrap();
        boxed.send_error(&packet("b"), true).unwrap();

        let sent = memory.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, SentKind::Dump);
        assert_eq!(sent[1].kind, SentKind::Error);
        assert!(sent[1].is_final);
        assert_eq!(memory.bodies(), ["a", "b"]);
    }
}

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, TryRecvError, bounded};
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use crate::hub::{Frame, ProtocolError, SessionId, SyncHub};
use crate::{debug, log};

/// How long a read may block before outbound frames are drained again
const READ_POLL: Duration = Duration::from_millis(25);

/// A viewer that accepts nothing for this long is dropped
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames queued for one viewer before the hub gives up on it
pub(super) const OUTBOUND_CAPACITY: usize = 256;

/// Outcome of one pass over the session's inputs
enum Step {
    Continue,
    Closed,
}

/// Serve one viewer until either side closes.
pub(super) fn run(stream: TcpStream, peer: SocketAddr, hub: Arc<SyncHub>) {
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            log!("ws"; "handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let stream = ws.get_ref();
    if let Err(e) = stream
        .set_read_timeout(Some(READ_POLL))
        .and_then(|()| stream.set_write_timeout(Some(WRITE_TIMEOUT)))
    {
        log!("ws"; "failed to configure {}: {}", peer, e);
        return;
    }

    let (tx, rx) = bounded(OUTBOUND_CAPACITY);
    let id = hub.connect(Box::new(tx));
    debug!("ws"; "{} is session {}", peer, id);

    loop {
        if let Step::Closed = drain_outbound(&mut ws, &rx, id) {
            break;
        }
        if let Step::Closed = read_inbound(&mut ws, &hub, id) {
            break;
        }
    }

    hub.disconnect(id);
}

/// Write every queued frame, in order.
fn drain_outbound(ws: &mut WebSocket<TcpStream>, rx: &Receiver<Frame>, id: SessionId) -> Step {
    loop {
        match rx.try_recv() {
            Ok(Frame::Text(text)) => {
                if let Err(e) = ws.send(Message::text(text.to_string())) {
                    debug!("ws"; "send to {} failed: {}", id, e);
                    return Step::Closed;
                }
            }
            Ok(Frame::Close) => {
                let _ = ws.close(None);
                let _ = ws.flush();
                return Step::Closed;
            }
            Err(TryRecvError::Empty) => return Step::Continue,
            // Sender dropped: the hub already forgot this session
            Err(TryRecvError::Disconnected) => return Step::Closed,
        }
    }
}

/// Wait briefly for one inbound message and hand it to the hub.
fn read_inbound(ws: &mut WebSocket<TcpStream>, hub: &SyncHub, id: SessionId) -> Step {
    match ws.read() {
        Ok(Message::Text(text)) => {
            hub.handle_message(id, text.as_str());
            Step::Continue
        }
        Ok(Message::Binary(_)) => {
            hub.reject(id, &ProtocolError::Binary);
            Step::Continue
        }
        Ok(Message::Close(_)) => {
            debug!("ws"; "session {} closed by viewer", id);
            Step::Closed
        }
        // Ping/Pong are answered by tungstenite itself
        Ok(_) => Step::Continue,
        Err(WsError::Io(ref e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            Step::Continue
        }
        Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Step::Closed,
        Err(e) => {
            debug!("ws"; "session {} read error: {}", id, e);
            Step::Closed
        }
    }
}

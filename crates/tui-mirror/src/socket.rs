//! Cross-process mirror channel over a Unix domain socket.
//!
//! The first participant to open a channel binds its socket and becomes the
//! relay; later participants connect to it. Frames are newline-delimited
//! JSON. The relay fans frames out to every peer except the sender and
//! delivers them to its own listeners.
//!
//! Sockets are never blocked on. Outbound frames queue per peer and drain as
//! the socket accepts them, so a slow viewer cannot stall the host.

use crate::error::{MirrorError, MirrorResult};
use crate::transport::{lock, Listener, Listeners, Subscription, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Queued bytes a peer may fall behind by before it is dropped.
const MAX_BACKLOG: usize = 1 << 20;

/// Socket path for a channel name.
pub fn channel_socket_path(name: &str) -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());

    PathBuf::from(runtime_dir)
        .join("tui-mirror")
        .join(format!("{}.sock", name))
}

/// Frames read in one pass, plus why the peer went away if it did.
struct Inbound {
    frames: Vec<Vec<u8>>,
    hangup: Option<MirrorError>,
}

struct Peer {
    stream: UnixStream,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
}

impl Peer {
    fn new(stream: UnixStream) -> MirrorResult<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            read_buffer: Vec::with_capacity(4096),
            write_buffer: Vec::new(),
        })
    }

    /// Queue one whole frame and write as much as the socket takes.
    fn send(&mut self, frame: &[u8]) -> MirrorResult<()> {
        if self.write_buffer.len() + frame.len() > MAX_BACKLOG {
            return Err(MirrorError::Backlog(self.write_buffer.len()));
        }
        self.write_buffer.extend_from_slice(frame);
        self.flush()
    }

    /// Write queued bytes until the socket would block. A partly written
    /// frame keeps its tail queued.
    fn flush(&mut self) -> MirrorResult<()> {
        while !self.write_buffer.is_empty() {
            match self.stream.write(&self.write_buffer) {
                Ok(0) => return Err(MirrorError::Closed),
                Ok(n) => {
                    self.write_buffer.drain(..n);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn pending_bytes(&self) -> usize {
        self.write_buffer.len()
    }

    /// Read whatever is available and return complete frames.
    ///
    /// Frames that arrived before a hangup are still returned.
    fn recv_frames(&mut self) -> Inbound {
        let mut buf = [0u8; 4096];
        let mut hangup = None;
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    hangup = Some(MirrorError::Closed);
                    break;
                }
                Ok(n) => self.read_buffer.extend_from_slice(&buf[..n]),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    hangup = Some(e.into());
                    break;
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.read_buffer.drain(..=pos).collect();
            line.pop();
            if !line.is_empty() {
                frames.push(line);
            }
        }
        Inbound { frames, hangup }
    }
}

enum Role {
    Relay {
        listener: UnixListener,
        path: PathBuf,
        peers: Vec<Peer>,
    },
    Client {
        peer: Peer,
    },
    Offline,
}

impl Role {
    fn label(&self) -> &'static str {
        match self {
            Self::Relay { .. } => "relay",
            Self::Client { .. } => "client",
            Self::Offline => "offline",
        }
    }

    /// Push out queued frames, best effort.
    fn flush(&mut self) {
        match self {
            Self::Relay { peers, .. } => {
                for peer in peers.iter_mut() {
                    let _ = peer.flush();
                }
            }
            Self::Client { peer } => {
                let _ = peer.flush();
            }
            Self::Offline => {}
        }
    }
}

/// A mirror channel shared between processes through a Unix socket.
pub struct SocketChannel<P> {
    name: String,
    role: Mutex<Role>,
    listeners: Arc<Mutex<Listeners<P>>>,
    closed: AtomicBool,
    _payload: PhantomData<fn() -> P>,
}

impl<P> SocketChannel<P>
where
    P: Serialize + DeserializeOwned + 'static,
{
    /// Join the channel called `name` at its default socket path.
    pub fn open(name: &str) -> Self {
        Self::open_at(name, &channel_socket_path(name))
    }

    /// Join the channel using an explicit socket path.
    pub fn open_at(name: &str, path: &Path) -> Self {
        let role = match connect_or_bind(path) {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(channel = %name, path = %path.display(), error = %e, "mirror socket unavailable, running offline");
                Role::Offline
            }
        };
        tracing::info!(channel = %name, role = role.label(), "opened socket mirror channel");

        Self {
            name: name.to_string(),
            role: Mutex::new(role),
            listeners: Listeners::new(),
            closed: AtomicBool::new(false),
            _payload: PhantomData,
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this participant owns the socket.
    pub fn is_relay(&self) -> bool {
        matches!(*lock(&self.role), Role::Relay { .. })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Connected peers (relay only).
    pub fn peer_count(&self) -> usize {
        let mut role = lock(&self.role);
        if let Role::Relay { listener, peers, .. } = &mut *role {
            accept_pending(listener, peers);
            peers.len()
        } else {
            0
        }
    }

    /// Bytes still queued for peers.
    pub fn backlog(&self) -> usize {
        match &*lock(&self.role) {
            Role::Relay { peers, .. } => peers.iter().map(Peer::pending_bytes).sum(),
            Role::Client { peer } => peer.pending_bytes(),
            Role::Offline => 0,
        }
    }

    fn encode(payload: &P) -> MirrorResult<Vec<u8>> {
        let mut frame = serde_json::to_vec(payload)?;
        frame.push(b'\n');
        Ok(frame)
    }

    fn decode(frame: &[u8]) -> MirrorResult<P> {
        Ok(serde_json::from_slice(frame)?)
    }

    /// Collect inbound frames, forwarding through the relay as needed.
    fn collect_inbound(&self) -> Vec<Vec<u8>> {
        let mut role = lock(&self.role);
        let mut inbound = Vec::new();
        let mut went_offline = false;

        match &mut *role {
            Role::Relay { listener, peers, .. } => {
                accept_pending(listener, peers);

                let mut received: Vec<(usize, Vec<u8>)> = Vec::new();
                let mut dead = Vec::new();
                for (idx, peer) in peers.iter_mut().enumerate() {
                    let Inbound { frames, hangup } = peer.recv_frames();
                    received.extend(frames.into_iter().map(|f| (idx, f)));
                    if let Some(e) = hangup {
                        tracing::debug!(channel = %self.name, error = %e, "mirror peer disconnected");
                        dead.push(idx);
                    }
                }

                for (idx, peer) in peers.iter_mut().enumerate() {
                    if dead.contains(&idx) {
                        continue;
                    }
                    let mut result = peer.flush();
                    for (from, frame) in &received {
                        if result.is_err() {
                            break;
                        }
                        if *from == idx {
                            continue;
                        }
                        let mut line = frame.clone();
                        line.push(b'\n');
                        result = peer.send(&line);
                    }
                    if let Err(e) = result {
                        tracing::debug!(channel = %self.name, error = %e, "failed to forward mirror frame");
                        dead.push(idx);
                    }
                }

                prune(peers, &mut dead);
                inbound.extend(received.into_iter().map(|(_, frame)| frame));
            }
            Role::Client { peer } => {
                let flushed = peer.flush();
                let Inbound { frames, hangup } = peer.recv_frames();
                inbound = frames;
                if let Some(e) = hangup.or(flushed.err()) {
                    tracing::warn!(channel = %self.name, error = %e, "lost mirror relay, going offline");
                    went_offline = true;
                }
            }
            Role::Offline => {}
        }

        if went_offline {
            *role = Role::Offline;
        }
        inbound
    }
}

impl<P> Transport<P> for SocketChannel<P>
where
    P: Serialize + DeserializeOwned + 'static,
{
    fn broadcast(&self, payload: &P) {
        if self.is_closed() {
            return;
        }
        let frame = match Self::encode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(channel = %self.name, error = %e, "failed to encode mirror payload");
                return;
            }
        };

        let mut role = lock(&self.role);
        let mut went_offline = false;
        match &mut *role {
            Role::Relay { listener, peers, .. } => {
                accept_pending(listener, peers);
                let mut dead = Vec::new();
                for (idx, peer) in peers.iter_mut().enumerate() {
                    if let Err(e) = peer.send(&frame) {
                        tracing::debug!(channel = %self.name, error = %e, "dropping mirror peer");
                        dead.push(idx);
                    }
                }
                prune(peers, &mut dead);
            }
            Role::Client { peer } => {
                if let Err(e) = peer.send(&frame) {
                    tracing::warn!(channel = %self.name, error = %e, "lost mirror relay, going offline");
                    went_offline = true;
                }
            }
            Role::Offline => {}
        }

        if went_offline {
            *role = Role::Offline;
        }
    }

    fn subscribe(&self, listener: Listener<P>) -> Subscription {
        if self.is_closed() {
            return Subscription::detached();
        }
        Listeners::register(&self.listeners, listener)
    }

    fn pump(&self) -> usize {
        let mut delivered = 0;
        for frame in self.collect_inbound() {
            match Self::decode(&frame) {
                Ok(payload) => {
                    Listeners::dispatch(&self.listeners, &payload);
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(channel = %self.name, error = %e, "dropping undecodable mirror frame");
                }
            }
        }
        delivered
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut previous = std::mem::replace(&mut *lock(&self.role), Role::Offline);
        previous.flush();
        match previous {
            Role::Relay { path, .. } => {
                let _ = std::fs::remove_file(&path);
            }
            Role::Client { peer } => {
                let _ = peer.stream.shutdown(std::net::Shutdown::Both);
            }
            Role::Offline => {}
        }
        Listeners::clear(&self.listeners);
        tracing::debug!(channel = %self.name, "closed socket mirror channel");
    }

    fn is_available(&self) -> bool {
        !matches!(*lock(&self.role), Role::Offline)
    }
}

impl<P> Drop for SocketChannel<P> {
    fn drop(&mut self) {
        let mut role = lock(&self.role);
        role.flush();
        if let Role::Relay { path, .. } = &*role {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn connect_or_bind(path: &Path) -> MirrorResult<Role> {
    if let Ok(stream) = UnixStream::connect(path) {
        return Ok(Role::Client {
            peer: Peer::new(stream)?,
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Nobody answered, so any file left here is stale.
    let _ = std::fs::remove_file(path);

    let listener = UnixListener::bind(path)
        .map_err(|e| MirrorError::Unavailable(format!("bind {}: {}", path.display(), e)))?;
    listener.set_nonblocking(true)?;

    Ok(Role::Relay {
        listener,
        path: path.to_path_buf(),
        peers: Vec::new(),
    })
}

fn accept_pending(listener: &UnixListener, peers: &mut Vec<Peer>) {
    loop {
        match listener.accept() {
            Ok((stream, _)) => match Peer::new(stream) {
                Ok(peer) => {
                    tracing::debug!("mirror peer connected");
                    peers.push(peer);
                }
                Err(e) => tracing::warn!(error = %e, "failed to set up mirror peer"),
            },
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept mirror peer");
                break;
            }
        }
    }
}

fn prune(peers: &mut Vec<Peer>, dead: &mut Vec<usize>) {
    dead.sort_unstable();
    dead.dedup();
    for idx in dead.drain(..).rev() {
        peers.remove(idx);
    }
}

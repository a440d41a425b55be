//! Session registry for connected clients
//!
//! This module owns every live session, including:
//! - Id assignment from a fixed-capacity slot table (lowest free slot first)
//! - The outbound frame queue feeding each connection's writer task
//! - The simulated player that belongs to each session
//!
//! The registry is only ever touched by the server's control loop, so it holds
//! no locks. Iteration always follows id order, which is also the order of
//! player records in every snapshot.

use crate::physics::Player;
use bytes::Bytes;
use log::info;
use shared::PlayerState;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// One connected client and the tasks serving its socket
#[derive(Debug)]
pub struct Client {
    /// Slot index, also the player id on the wire
    pub id: u8,
    pub addr: SocketAddr,
    /// Token of the connection occupying this slot, used to spot stale events
    pub connection: u64,
    /// Set once the `CONNECT`/`WELCOME` handshake has completed
    pub welcomed: bool,
    pub player: Player,
    outbound: mpsc::Sender<Bytes>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(id: u8, addr: SocketAddr, connection: u64, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            addr,
            connection,
            welcomed: false,
            player: Player::new(id, 0, 0),
            outbound,
            reader: None,
            writer: None,
        }
    }

    /// Queues an encoded frame without waiting.
    ///
    /// Fails when the writer has fallen behind by a whole queue or is gone;
    /// either way the peer can no longer be served.
    pub fn send(&self, frame: Bytes) -> Result<(), TrySendError<Bytes>> {
        self.outbound.try_send(frame)
    }

    pub fn take_writer(&mut self) -> Option<JoinHandle<()>> {
        self.writer.take()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // The writer ends on its own once `outbound` closes and the queue drains
        if let Some(reader) = &self.reader {
            reader.abort();
        }
    }
}

pub struct ClientManager {
    /// Indexed by client id
    slots: Vec<Option<Client>>,
}

impl ClientManager {
    /// Creates an empty registry with room for `max_clients` sessions.
    ///
    /// Ids are `u8`, so the capacity is capped at 255 slots.
    pub fn new(max_clients: usize) -> Self {
        let capacity = max_clients.min(usize::from(u8::MAX));
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Registers a connection in the lowest free slot.
    ///
    /// Returns `None` when every slot is taken.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        connection: u64,
        outbound: mpsc::Sender<Bytes>,
    ) -> Option<u8> {
        let index = self.slots.iter().position(Option::is_none)?;
        let id = u8::try_from(index).ok()?;
        self.slots[index] = Some(Client::new(id, addr, connection, outbound));
        info!(
            "Client {} registered from {} ({}/{})",
            id,
            addr,
            self.len(),
            self.capacity()
        );
        Some(id)
    }

    /// Hands the connection's reader and writer tasks to the session.
    pub fn attach_tasks(&mut self, id: u8, reader: JoinHandle<()>, writer: JoinHandle<()>) {
        match self.get_mut(id) {
            Some(client) => {
                client.reader = Some(reader);
                client.writer = Some(writer);
            }
            None => reader.abort(),
        }
    }

    /// Frees the slot. Dropping the returned client closes its connection.
    pub fn remove_client(&mut self, id: u8) -> Option<Client> {
        self.slots.get_mut(usize::from(id))?.take()
    }

    pub fn get(&self, id: u8) -> Option<&Client> {
        self.slots.get(usize::from(id))?.as_ref()
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut Client> {
        self.slots.get_mut(usize::from(id))?.as_mut()
    }

    pub fn connection_of(&self, id: u8) -> Option<u64> {
        self.get(id).map(|client| client.connection)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.slots.iter().flatten()
    }

    /// Players of every session, in id order.
    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().flatten().map(|client| &mut client.player)
    }

    pub fn player_states(&self) -> Vec<PlayerState> {
        self.iter().map(|client| client.player.state()).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.iter().filter(|client| client.player.alive).count()
    }

    pub fn all_welcomed(&self) -> bool {
        self.iter().all(|client| client.welcomed)
    }

    /// Queues a frame for one client. Returns false if it could not be queued.
    pub fn send(&self, id: u8, frame: Bytes) -> bool {
        self.get(id)
            .map(|client| client.send(frame).is_ok())
            .unwrap_or(false)
    }

    /// Queues a frame for every client and returns the ids that failed.
    ///
    /// A failure never stops delivery to the remaining clients.
    pub fn broadcast(&self, frame: &Bytes) -> Vec<u8> {
        self.iter()
            .filter(|client| client.send(frame.clone()).is_err())
            .map(|client| client.id)
            .collect()
    }

    /// Empties the registry, handing back every session in id order.
    pub fn drain(&mut self) -> Vec<Client> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn queue(capacity: usize) -> (mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>) {
        mpsc::channel(capacity)
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(4);
        assert_eq!(manager.capacity(), 4);
        assert!(manager.is_empty());
        assert!(!manager.is_full());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_capacity_is_capped_to_id_range() {
        let manager = ClientManager::new(1000);
        assert_eq!(manager.capacity(), 255);
    }

    #[test]
    fn test_ids_are_dense_from_zero() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = queue(4);

        assert_eq!(manager.add_client(test_addr(), 1, tx.clone()), Some(0));
        assert_eq!(manager.add_client(test_addr(), 2, tx.clone()), Some(1));
        assert_eq!(manager.add_client(test_addr(), 3, tx.clone()), Some(2));
        assert!(manager.is_full());
        assert_eq!(manager.add_client(test_addr(), 4, tx), None);
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = queue(4);
        manager.add_client(test_addr(), 1, tx.clone());
        manager.add_client(test_addr(), 2, tx.clone());
        manager.add_client(test_addr(), 3, tx.clone());

        let removed = manager.remove_client(1).unwrap();
        assert_eq!(removed.connection, 2);
        assert!(manager.get(1).is_none());
        assert!(manager.remove_client(1).is_none());

        assert_eq!(manager.add_client(test_addr(), 9, tx), Some(1));
        assert_eq!(manager.connection_of(1), Some(9));
    }

    #[test]
    fn test_remove_out_of_range_id() {
        let mut manager = ClientManager::new(2);
        assert!(manager.remove_client(200).is_none());
        assert!(manager.get(200).is_none());
    }

    #[test]
    fn test_players_follow_id_order() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = queue(4);
        manager.add_client(test_addr(), 1, tx.clone());
        manager.add_client(test_addr(), 2, tx.clone());
        manager.add_client(test_addr(), 3, tx.clone());
        manager.remove_client(0);
        manager.add_client(test_addr(), 4, tx);

        let ids: Vec<u8> = manager.players_mut().map(|player| player.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let ids: Vec<u8> = manager.player_states().iter().map(|state| state.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_alive_count_and_welcome() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = queue(4);
        manager.add_client(test_addr(), 1, tx.clone());
        manager.add_client(test_addr(), 2, tx);

        assert!(!manager.all_welcomed());
        manager.get_mut(0).unwrap().welcomed = true;
        assert!(!manager.all_welcomed());
        manager.get_mut(1).unwrap().welcomed = true;
        assert!(manager.all_welcomed());

        assert_eq!(manager.alive_count(), 2);
        manager.get_mut(1).unwrap().player.alive = false;
        assert_eq!(manager.alive_count(), 1);
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let mut manager = ClientManager::new(2);
        let (tx0, mut rx0) = queue(4);
        let (tx1, mut rx1) = queue(4);
        manager.add_client(test_addr(), 1, tx0);
        manager.add_client(test_addr(), 2, tx1);

        let frame = Bytes::from_static(&[0xAB, 0x01, 0x00, 0x04]);
        assert!(manager.broadcast(&frame).is_empty());
        assert_eq!(rx0.try_recv().unwrap(), frame);
        assert_eq!(rx1.try_recv().unwrap(), frame);
    }

    #[test]
    fn test_broadcast_reports_stuck_and_closed_queues() {
        let mut manager = ClientManager::new(3);
        let (full_tx, _full_rx) = queue(1);
        let (ok_tx, mut ok_rx) = queue(4);
        let (closed_tx, closed_rx) = queue(4);
        drop(closed_rx);
        manager.add_client(test_addr(), 1, full_tx);
        manager.add_client(test_addr(), 2, ok_tx);
        manager.add_client(test_addr(), 3, closed_tx);

        let frame = Bytes::from_static(b"frame");
        assert!(manager.send(0, frame.clone()));
        assert_eq!(manager.broadcast(&frame), vec![0, 2]);
        // The healthy client still got its copy
        assert_eq!(ok_rx.try_recv().unwrap(), frame);
        assert!(!manager.send(2, frame));
    }

    #[test]
    fn test_send_to_unknown_client() {
        let manager = ClientManager::new(2);
        assert!(!manager.send(0, Bytes::from_static(b"x")));
    }

    #[test]
    fn test_removing_client_closes_its_queue() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = queue(4);
        manager.add_client(test_addr(), 1, tx);

        drop(manager.remove_client(0));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_drain_hands_back_writers() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = queue(4);
        manager.add_client(test_addr(), 1, tx.clone());
        manager.add_client(test_addr(), 2, tx);
        manager.attach_tasks(0, tokio::spawn(async {}), tokio::spawn(async {}));

        let mut clients = manager.drain();
        assert!(manager.is_empty());
        assert_eq!(clients.len(), 2);
        assert!(clients[0].take_writer().is_some());
        assert!(clients[1].take_writer().is_none());
    }

    #[tokio::test]
    async fn test_dropping_client_aborts_reader() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = queue(4);
        manager.add_client(test_addr(), 1, tx);

        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let reader = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await
        });
        manager.attach_tasks(0, reader, tokio::spawn(async {}));
        drop(manager.remove_client(0));

        // The sender is dropped with the aborted task
        assert!(alive_rx.await.is_err());
    }
}

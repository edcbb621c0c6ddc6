//! Blocking poll loop running a node over a `Read + Write` transport,
//! such as a serial port.

use std::io::{ErrorKind, Read, Result, Write};

use super::{NodeConfig, NodeState, ReceiveData};
use crate::dispatch::{Actuator, Dispatcher, Sensor};

/// A bus node bound to a transport and a device.
///
/// Each call to [`poll()`](Self::poll()) reads from the transport and runs
/// any complete command through to its reply. Reply transmission is fire
/// and forget: write errors are logged and otherwise ignored.
pub struct Node<IO, S, A> {
    io: IO,
    config: NodeConfig,
    receiver: ReceiveData,
    dispatcher: Dispatcher<S, A>,
}

impl<IO, S, A> Node<IO, S, A>
where
    IO: Read + Write,
    S: Sensor,
    A: Actuator,
{
    pub fn new(io: IO, config: NodeConfig, sensor: S, actuator: A) -> Self {
        Self {
            io,
            config,
            receiver: ReceiveData::new(config),
            dispatcher: Dispatcher::new(config, sensor, actuator),
        }
    }

    /// Read once from the transport and handle what was received.
    ///
    /// Returns `Ok(false)` when the transport reports end of stream.
    /// Timeouts are not errors, the node simply keeps listening.
    /// # Errors
    /// Any other read error is returned.
    pub fn poll(&mut self) -> Result<bool> {
        let mut buf = [0; 1];
        let len = match self.io.read(&mut buf) {
            Ok(0) => return Ok(false),
            Ok(len) => len,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(true)
            }
            Err(err) => return Err(err),
        };

        let receiver = std::mem::replace(&mut self.receiver, ReceiveData::new(self.config));
        let mut node = receiver.receive_data(&buf[..len]);
        loop {
            node = match node {
                NodeState::ReceiveData(recv) => {
                    self.receiver = recv;
                    return Ok(true);
                }
                NodeState::Execute(command) => command.execute(&mut self.dispatcher),
                NodeState::SendData(send) => {
                    if let Err(err) = self
                        .io
                        .write_all(send.get_data())
                        .and_then(|_| self.io.flush())
                    {
                        log::warn!("Failed to send reply: {}", err);
                    }
                    send.data_sent()
                }
            };
        }
    }

    /// Poll until the transport reports end of stream.
    /// # Errors
    /// Returns the first read error that isn't a timeout.
    pub fn run(&mut self) -> Result<()> {
        log::debug!("Node {} listening", self.config.id());
        while self.poll()? {}
        log::debug!("Node {} transport closed", self.config.id());
        Ok(())
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, A> {
        &self.dispatcher
    }

    pub fn into_inner(self) -> (IO, Dispatcher<S, A>) {
        (self.io, self.dispatcher)
    }
}

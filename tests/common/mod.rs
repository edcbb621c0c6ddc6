#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::min;
use std::collections::VecDeque;
use std::io::{Error, ErrorKind, Write};
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use npp301_proto::dispatch::{Actuator, Sensor};
use npp301_proto::master::Transport;
use npp301_proto::Channel;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scripted serial line: reads come from a fixed byte string, writes are
/// collected for inspection.
pub struct SerialInterface {
    rx: Vec<u8>,
    rx_pos: usize,
    pub tx: Vec<u8>,
    do_read_error: bool,
}

pub struct SerialIOPlane(Rc<RefCell<SerialInterface>>);

impl SerialIOPlane {
    pub fn new(serial_if: &Rc<RefCell<SerialInterface>>) -> SerialIOPlane {
        SerialIOPlane(serial_if.clone())
    }
}

impl SerialInterface {
    pub fn new(rx: &[u8]) -> Rc<RefCell<SerialInterface>> {
        Rc::new(RefCell::new(SerialInterface {
            rx: rx.to_vec(),
            tx: Vec::new(),
            rx_pos: 0,
            do_read_error: false,
        }))
    }

    pub fn trigger_read_error(&mut self) {
        self.do_read_error = true;
    }
}

impl std::io::Read for SerialIOPlane {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.do_read_error {
            inner.do_read_error = false;
            Err(Error::new(ErrorKind::PermissionDenied, "IO read error"))
        } else {
            let old_pos = inner.rx_pos;
            inner.rx_pos = min(old_pos + buf.len(), inner.rx.len());
            let len = inner.rx_pos - old_pos;
            buf[..len].copy_from_slice(&inner.rx[old_pos..inner.rx_pos]);
            Ok(len)
        }
    }
}

impl std::io::Write for SerialIOPlane {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().tx.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// What a simulated board has been asked to do.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BoardLog {
    pub led: bool,
    pub reference: Option<(u8, bool)>,
    pub samples: usize,
}

/// Simulated analog front end and outputs, shared with the test so it can
/// be inspected while a node owns it.
#[derive(Clone, Default)]
pub struct FakeBoard {
    pub log: Arc<Mutex<BoardLog>>,
    pub base: u16,
}

impl FakeBoard {
    pub fn new(base: u16) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> BoardLog {
        self.log.lock().unwrap().clone()
    }
}

impl Sensor for FakeBoard {
    fn sample(&mut self, channel: Channel) -> u16 {
        self.log.lock().unwrap().samples += 1;
        self.base + u16::from(channel.sensor_pin())
    }
}

impl Actuator for FakeBoard {
    fn set_led(&mut self, on: bool) {
        self.log.lock().unwrap().led = on;
    }

    fn set_reference(&mut self, level: u8, enabled: bool) {
        self.log.lock().unwrap().reference = Some((level, enabled));
    }
}

type BusT = Mutex<VecDeque<u8>>;

/// Simulated multidrop bus. Everything the master sends reaches every node,
/// everything a node sends reaches the master.
#[derive(Default)]
pub struct RS485Bus {
    masters: Mutex<Vec<Weak<BusInterfaceLink>>>,
    nodes: Mutex<Vec<Weak<BusInterfaceLink>>>,
    eof: AtomicBool,
}

impl RS485Bus {
    pub fn new() -> Arc<RS485Bus> {
        Default::default()
    }

    pub fn disconnect(&self) {
        self.eof.store(true, SeqCst);
        let masters = self.masters.lock().unwrap();
        let nodes = self.nodes.lock().unwrap();
        for link in masters.iter().chain(nodes.iter()).filter_map(Weak::upgrade) {
            // take the lock so a reader can't miss the wakeup
            let _rx = link.rx.lock().unwrap();
            link.rx_condvar.notify_all();
        }
    }

    pub fn new_master_interface(self: &Arc<Self>) -> BusInterface {
        let link = Arc::new(BusInterfaceLink::new(true));
        self.masters.lock().unwrap().push(Arc::downgrade(&link));
        BusInterface::new(Arc::clone(self), link)
    }

    pub fn new_node_interface(self: &Arc<RS485Bus>) -> BusInterface {
        let link = Arc::new(BusInterfaceLink::new(false));
        self.nodes.lock().unwrap().push(Arc::downgrade(&link));
        BusInterface::new(Arc::clone(self), link)
    }

    fn broadcast(links: &Mutex<Vec<Weak<BusInterfaceLink>>>, data: &[u8]) {
        let links = links.lock().unwrap();
        for link in links.iter().filter_map(Weak::upgrade) {
            link.rx.lock().unwrap().extend(data);
            link.rx_condvar.notify_all();
        }
    }
}

pub struct BusInterface {
    bus: Arc<RS485Bus>,
    link: Arc<BusInterfaceLink>,
    pub timeout: Duration,
}

struct BusInterfaceLink {
    is_master: bool,
    rx: BusT,
    rx_condvar: Condvar,
}

impl BusInterfaceLink {
    fn new(is_master: bool) -> Self {
        BusInterfaceLink {
            is_master,
            rx: Default::default(),
            rx_condvar: Condvar::new(),
        }
    }
}

impl BusInterface {
    fn new(bus: Arc<RS485Bus>, link: Arc<BusInterfaceLink>) -> BusInterface {
        BusInterface {
            bus,
            link,
            timeout: Duration::from_millis(100),
        }
    }

    pub fn send(&mut self, data: &[u8]) {
        self.write_all(data).unwrap();
    }
}

impl std::io::Read for BusInterface {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            panic!("Testsuite called read with zero length buffer.")
        }

        let mut rx = self.link.rx.lock().expect("Read mutex is poisoned");
        if rx.is_empty() && !self.bus.eof.load(SeqCst) {
            rx = self
                .link
                .rx_condvar
                .wait_timeout(rx, self.timeout)
                .expect("Mutex lock failed")
                .0;
        }

        if let Some(byte) = rx.pop_front() {
            buf[0] = byte;
            Ok(1)
        } else if self.bus.eof.load(SeqCst) {
            Ok(0)
        } else {
            Err(Error::new(ErrorKind::TimedOut, "IO read timeout"))
        }
    }
}

impl std::io::Write for BusInterface {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.link.is_master {
            RS485Bus::broadcast(&self.bus.nodes, buf);
        } else {
            RS485Bus::broadcast(&self.bus.masters, buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Transport for BusInterface {
    fn clear_input(&mut self) -> std::io::Result<()> {
        self.link.rx.lock().expect("Read mutex is poisoned").clear();
        Ok(())
    }
}

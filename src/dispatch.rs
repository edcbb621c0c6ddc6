//! Command table and dispatch of addressed payloads to the device.
//!
//! The first byte of a payload selects the [`Command`], the rest holds its
//! arguments separated by commas or spaces. Once a frame has been accepted
//! a reply is always produced, failures included.

use core::ops::RangeInclusive;

use crate::node::NodeConfig;
use crate::nom_parser::node::{atoi, next_token};
use crate::reply::Reply;
use crate::types::Channel;

/// Analog input collaborator.
pub trait Sensor {
    /// Take one reading of `channel`.
    fn sample(&mut self, channel: Channel) -> u16;
}

/// Output collaborator.
pub trait Actuator {
    fn set_led(&mut self, on: bool);
    /// Drive the reference voltage output at `level`/256 of full scale,
    /// or switch it off.
    fn set_reference(&mut self, level: u8, enabled: bool);
}

impl<T: Sensor + ?Sized> Sensor for &mut T {
    fn sample(&mut self, channel: Channel) -> u16 {
        (**self).sample(channel)
    }
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    fn set_led(&mut self, on: bool) {
        (**self).set_led(on)
    }

    fn set_reference(&mut self, level: u8, enabled: bool) {
        (**self).set_reference(level, enabled)
    }
}

/// The commands understood by the node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// `v`: report the firmware version.
    Version,
    /// `L <0|1>`: set the LED. A lit LED overrides activity indication.
    Led,
    /// `a`: sample all analog channels.
    Analog,
    /// `w <level> [flag]`: set the reference voltage output, flag defaults to on.
    Reference,
}

impl Command {
    /// Command characters and the command each one selects.
    pub const TABLE: [(u8, Command); 4] = [
        (b'v', Command::Version),
        (b'L', Command::Led),
        (b'a', Command::Analog),
        (b'w', Command::Reference),
    ];

    pub fn lookup(c: u8) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(key, _)| *key == c)
            .map(|(_, cmd)| *cmd)
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Command::Version => b'v',
            Command::Led => b'L',
            Command::Analog => b'a',
            Command::Reference => b'w',
        }
    }

    /// Accepted number of arguments. Arguments past the maximum are never read.
    pub const fn arity(self) -> RangeInclusive<usize> {
        match self {
            Command::Version | Command::Analog => 0..=0,
            Command::Led => 1..=1,
            Command::Reference => 1..=2,
        }
    }

    fn missing_args_reason(self) -> &'static str {
        match self {
            Command::Led => "no value",
            Command::Reference => "missing level and on/off flag",
            Command::Version | Command::Analog => "missing argument",
        }
    }
}

/// Lazy iterator over the arguments of a command.
#[derive(Debug, Clone)]
pub struct Args<'a> {
    rest: &'a [u8],
    remaining: usize,
}

impl<'a> Args<'a> {
    pub fn new(args: &'a [u8]) -> Self {
        Self {
            rest: args,
            remaining: usize::MAX,
        }
    }

    /// Stop after at most `count` arguments.
    pub fn limit(mut self, count: usize) -> Self {
        self.remaining = self.remaining.min(count);
        self
    }

    /// The next argument converted to an integer. Non-numeric text is 0.
    pub fn next_int(&mut self) -> Option<i32> {
        self.next().map(atoi)
    }
}

impl<'a> Iterator for Args<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (token, rest) = next_token(self.rest)?;
        self.rest = rest;
        self.remaining -= 1;
        Some(token)
    }
}

/// State of the device kept between commands.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// Set while the LED is held on by command. The LED then no longer
    /// blinks while commands are being interpreted.
    pub led_override: bool,
}

/// Runs commands against the device collaborators and formats the replies.
#[derive(Debug)]
pub struct Dispatcher<S, A> {
    version: &'static str,
    sensor: S,
    actuator: A,
    state: DeviceState,
}

impl<S: Sensor, A: Actuator> Dispatcher<S, A> {
    pub fn new(config: NodeConfig, sensor: S, actuator: A) -> Self {
        Self {
            version: config.version(),
            sensor,
            actuator,
            state: DeviceState::default(),
        }
    }

    /// Run the command in `payload` and return the reply to send.
    ///
    /// Returns `None` for an empty payload, which is not a command.
    pub fn dispatch(&mut self, payload: &[u8]) -> Option<Reply> {
        let (&command_char, args) = payload.split_first()?;

        if !self.state.led_override {
            self.actuator.set_led(true);
        }

        let reply = match Command::lookup(command_char) {
            Some(command) => {
                log::debug!("Running command {:?}", command);
                self.run(command, Args::new(args))
            }
            None => {
                log::debug!("Unknown command {:?}", command_char as char);
                Reply::error(command_char, "Unknown command")
            }
        };

        if !self.state.led_override {
            self.actuator.set_led(false);
        }
        Some(reply)
    }

    fn run(&mut self, command: Command, args: Args<'_>) -> Reply {
        let c = command.as_byte();
        let arity = command.arity();
        let mut args = args.limit(*arity.end());
        if args.clone().count() < *arity.start() {
            return Reply::error(c, command.missing_args_reason());
        }

        match command {
            Command::Version => Reply::new(c, format_args!("{}", self.version)),
            Command::Led => {
                // only the least significant bit counts
                let on = args.next_int().unwrap_or(0) & 1 == 1;
                self.actuator.set_led(on);
                self.state.led_override = on;
                Reply::new(c, format_args!("{}", u8::from(on)))
            }
            Command::Analog => {
                let mut readings = [0u16; 5];
                for (reading, channel) in readings.iter_mut().zip(Channel::ALL.iter()) {
                    *reading = self.sensor.sample(*channel);
                }
                let [a, b, c2, d, e] = readings;
                Reply::new(c, format_args!("{} {} {} {} {}", a, b, c2, d, e))
            }
            Command::Reference => {
                let level = args.next_int().unwrap_or(0).max(0).min(255) as u8;
                // the flag is a signed byte, only its low 8 bits count
                let enabled = args.next_int().unwrap_or(1) as i8 != 0;
                self.actuator.set_reference(level, enabled);
                if enabled {
                    Reply::new(c, format_args!("VREF on level={}", level))
                } else {
                    Reply::new(c, format_args!("VREF off"))
                }
            }
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn into_parts(self) -> (S, A) {
        (self.sensor, self.actuator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeSensor {
        sampled: Vec<Channel>,
    }

    impl Sensor for FakeSensor {
        fn sample(&mut self, channel: Channel) -> u16 {
            self.sampled.push(channel);
            u16::from(channel.sensor_pin()) * 100
        }
    }

    #[derive(Debug, Default)]
    struct FakeActuator {
        led: bool,
        led_history: Vec<bool>,
        reference: Option<(u8, bool)>,
    }

    impl Actuator for FakeActuator {
        fn set_led(&mut self, on: bool) {
            self.led = on;
            self.led_history.push(on);
        }

        fn set_reference(&mut self, level: u8, enabled: bool) {
            self.reference = Some((level, enabled));
        }
    }

    fn dispatcher() -> Dispatcher<FakeSensor, FakeActuator> {
        Dispatcher::new(
            NodeConfig::default(),
            FakeSensor::default(),
            FakeActuator::default(),
        )
    }

    fn body(reply: Option<Reply>) -> String {
        let reply = reply.expect("no reply");
        format!("{} {}", reply.command() as char, reply.body())
    }

    #[test]
    fn test_command_table() {
        for (c, cmd) in Command::TABLE.iter() {
            assert_eq!(Command::lookup(*c), Some(*cmd));
            assert_eq!(cmd.as_byte(), *c);
        }
        assert_eq!(Command::lookup(b'z'), None);
        assert_eq!(Command::lookup(b'V'), None);
    }

    #[test]
    fn test_args() {
        let mut args = Args::new(b" 12,  0 x,");
        assert_eq!(args.next(), Some(&b"12"[..]));
        assert_eq!(args.next_int(), Some(0));
        assert_eq!(args.next_int(), Some(0)); // "x"
        assert_eq!(args.next(), None);
        assert_eq!(Args::new(b"").count(), 0);

        let mut args = Args::new(b"1 2 3").limit(2);
        assert_eq!(args.next_int(), Some(1));
        assert_eq!(args.next_int(), Some(2));
        assert_eq!(args.next(), None);
    }

    #[test]
    fn test_empty_payload() {
        let mut d = dispatcher();
        assert_eq!(d.dispatch(b""), None);
        assert!(d.actuator().led_history.is_empty());
    }

    #[test]
    fn test_version() {
        let mut d = dispatcher();
        assert_eq!(
            body(d.dispatch(b"v")),
            "v 0.1 PIC18F16Q41 NPP-301 Characterizer"
        );
        let mut d = Dispatcher::new(
            NodeConfig::default().with_version("test build"),
            FakeSensor::default(),
            FakeActuator::default(),
        );
        assert_eq!(body(d.dispatch(b"v")), "v test build");
    }

    #[test]
    fn test_activity_indication() {
        let mut d = dispatcher();
        d.dispatch(b"v");
        assert_eq!(d.actuator().led_history, [true, false]);
        assert!(!d.actuator().led);
    }

    #[test]
    fn test_led() {
        let mut d = dispatcher();
        assert_eq!(body(d.dispatch(b"L1")), "L 1");
        assert!(d.actuator().led);
        assert!(d.state().led_override);

        // the override suppresses activity indication
        d.actuator_mut().led_history.clear();
        d.dispatch(b"v");
        assert!(d.actuator().led_history.is_empty());
        assert!(d.actuator().led);

        assert_eq!(body(d.dispatch(b"L 0")), "L 0");
        assert!(!d.actuator().led);
        assert!(!d.state().led_override);

        // least significant bit only
        assert_eq!(body(d.dispatch(b"L2")), "L 0");
        assert_eq!(body(d.dispatch(b"L3")), "L 1");
    }

    #[test]
    fn test_led_missing_value() {
        let mut d = dispatcher();
        let reply = d.dispatch(b"L").unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.body(), "error: no value");
        assert!(!d.actuator().led);
        assert!(!d.state().led_override);

        assert!(d.dispatch(b"L ,").unwrap().is_error());
    }

    #[test]
    fn test_led_non_numeric_is_zero() {
        let mut d = dispatcher();
        d.dispatch(b"L1");
        assert_eq!(body(d.dispatch(b"L x")), "L 0");
        assert!(!d.actuator().led);
    }

    #[test]
    fn test_analog() {
        let mut d = dispatcher();
        assert_eq!(body(d.dispatch(b"a")), "a 800 200 400 500 600");
        assert_eq!(d.sensor().sampled, Channel::ALL);
        // extra arguments are ignored
        assert_eq!(body(d.dispatch(b"a 1 2")), "a 800 200 400 500 600");
    }

    #[test]
    fn test_reference() {
        let mut d = dispatcher();
        assert_eq!(body(d.dispatch(b"w 128")), "w VREF on level=128");
        assert_eq!(d.actuator().reference, Some((128, true)));

        assert_eq!(body(d.dispatch(b"w300,1")), "w VREF on level=255");
        assert_eq!(d.actuator().reference, Some((255, true)));

        assert_eq!(body(d.dispatch(b"w -5")), "w VREF on level=0");
        assert_eq!(d.actuator().reference, Some((0, true)));

        assert_eq!(body(d.dispatch(b"w 0 0")), "w VREF off");
        assert_eq!(d.actuator().reference, Some((0, false)));

        // 256 does not fit the flag byte and reads as 0
        assert_eq!(body(d.dispatch(b"w 10 256")), "w VREF off");
        assert_eq!(d.actuator().reference, Some((10, false)));
        assert_eq!(body(d.dispatch(b"w 10 257")), "w VREF on level=10");

        // a third argument is not part of the command
        assert_eq!(body(d.dispatch(b"w 20 1 0")), "w VREF on level=20");
        assert_eq!(d.actuator().reference, Some((20, true)));
    }

    #[test]
    fn test_reference_missing_args() {
        let mut d = dispatcher();
        let reply = d.dispatch(b"w").unwrap();
        assert_eq!(reply.body(), "error: missing level and on/off flag");
        assert_eq!(d.actuator().reference, None);
    }

    #[test]
    fn test_unknown_command() {
        let mut d = dispatcher();
        let reply = d.dispatch(b"z123").unwrap();
        assert_eq!(reply.command(), b'z');
        assert_eq!(reply.body(), "error: Unknown command");
        assert_eq!(reply.to_frame().as_ref(), b"/0z error: Unknown command#\n");
    }
}

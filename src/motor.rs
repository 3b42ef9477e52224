//! Actuator channel for the motor that sweeps the sensor along the keyboard.
//!
//! Three commands, fire-and-forget over OSC/UDP. Detection never depends
//! on this; the motor only changes what the camera sees.

use log::{debug, info};
use rosc::{OscMessage, OscPacket};
use std::io;
use std::net::UdpSocket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MotorCommand {
    Forwards,
    Reverse,
    Stop,
}

impl MotorCommand {
    pub fn address(&self) -> &'static str {
        match self {
            MotorCommand::Forwards => "/motor/forwards",
            MotorCommand::Reverse => "/motor/reverse",
            MotorCommand::Stop => "/motor/stop",
        }
    }

    pub fn packet(&self) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: self.address().to_string(),
            args: vec![],
        })
    }
}

pub struct MotorChannel {
    socket: UdpSocket,
    target: String,
}

impl MotorChannel {
    pub fn connect(target: String) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        info!("Motor channel → {}", target);
        Ok(Self { socket, target })
    }

    pub fn send(&self, command: MotorCommand) -> io::Result<()> {
        let buf = rosc::encoder::encode(&command.packet())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        self.socket.send_to(&buf, &self.target)?;
        debug!("motor: {:?}", command);
        Ok(())
    }
}

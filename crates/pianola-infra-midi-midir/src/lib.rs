use log::{debug, info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort as MidirPort};
use pianola_ports::midi::{
    parse_midi_message, MidiError, MidiInputPort, MidiInputStream, PlayerEvent, PlayerEventCallback,
};
use pianola_ports::types::{DeviceId, MidiInputDevice};
use std::time::Instant;

const UNKNOWN_PORT_NAME: &str = "Unknown Input";

/// `MidiInputPort` over the platform MIDI API. A backend that can't be
/// created at all reports `MidiError::Unsupported`.
pub struct MidirMidiInputPort {
    client_name: String,
}

impl MidirMidiInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_in(&self) -> Result<MidiInput, MidiError> {
        MidiInput::new(&self.client_name).map_err(|e| MidiError::Unsupported(e.to_string()))
    }

    fn enumerate(midi_in: &MidiInput) -> Vec<(DeviceId, String, MidirPort)> {
        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|port| {
                midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| UNKNOWN_PORT_NAME.to_string())
            })
            .collect();
        let ids = device_ids(&names);
        ids.into_iter()
            .zip(names)
            .zip(ports)
            .map(|((id, name), port)| (id, name, port))
            .collect()
    }
}

impl Default for MidirMidiInputPort {
    fn default() -> Self {
        Self::new("Pianola")
    }
}

/// Ids stay stable across runs as long as the port names do; repeated names
/// get a `#n` suffix in enumeration order.
pub fn device_ids(names: &[String]) -> Vec<DeviceId> {
    let mut ids = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let repeats = names[..index].iter().filter(|n| *n == name).count();
        let id = if repeats == 0 {
            format!("midir:{}", name)
        } else {
            format!("midir:{}#{}", name, repeats + 1)
        };
        ids.push(DeviceId(id));
    }
    ids
}

pub struct MidirMidiInputStream {
    connection: Option<MidiInputConnection<PlayerEventCallback>>,
}

impl MidiInputStream for MidirMidiInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
            debug!("midi input closed");
        }
    }
}

impl MidiInputPort for MidirMidiInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = self.create_midi_in()?;
        Ok(Self::enumerate(&midi_in)
            .into_iter()
            .map(|(id, name, _)| MidiInputDevice {
                id,
                name,
                is_available: true,
            })
            .collect())
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let mut midi_in = self.create_midi_in()?;
        midi_in.ignore(Ignore::All);

        let (name, port) = Self::enumerate(&midi_in)
            .into_iter()
            .find(|(id, _, _)| id == device_id)
            .map(|(_, name, port)| (name, port))
            .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                "pianola-input",
                |_stamp, message, callback| {
                    if let Some(event) = parse_midi_message(message) {
                        (callback)(PlayerEvent {
                            at: Instant::now(),
                            event,
                        });
                    }
                },
                cb,
            )
            .map_err(|e| {
                warn!("failed to connect to {}: {}", name, e);
                MidiError::DeviceUnavailable(e.to_string())
            })?;

        info!("connected to midi input '{}'", name);
        Ok(Box::new(MidirMidiInputStream {
            connection: Some(connection),
        }))
    }
}

//! Engine device enumeration

use crate::remote::{c_buffer_to_string, RemoteApi, DEVICE_STRING_LEN};

/// Driver model of a device as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDriver {
    Mme,
    Wdm,
    Ks,
    Asio,
    Other(i32),
}

impl From<i32> for DeviceDriver {
    fn from(raw: i32) -> Self {
        match raw {
            1 => DeviceDriver::Mme,
            3 => DeviceDriver::Wdm,
            4 => DeviceDriver::Ks,
            5 => DeviceDriver::Asio,
            other => DeviceDriver::Other(other),
        }
    }
}

/// A physical device known to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub hardware_id: String,
    pub driver: DeviceDriver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Read every device the engine lists for `direction`. Entries the engine
/// fails to describe are skipped.
pub fn list_devices(remote: &dyn RemoteApi, direction: Direction) -> Vec<Device> {
    let count = match direction {
        Direction::Input => remote.input_device_count(),
        Direction::Output => remote.output_device_count(),
    };

    let mut devices = Vec::with_capacity(count.max(0) as usize);
    for index in 0..count {
        let mut kind = 0;
        let mut name = [0u8; DEVICE_STRING_LEN];
        let mut hardware_id = [0u8; DEVICE_STRING_LEN];

        let code = match direction {
            Direction::Input => remote.input_device_desc(index, &mut kind, &mut name, &mut hardware_id),
            Direction::Output => remote.output_device_desc(index, &mut kind, &mut name, &mut hardware_id),
        };
        if code != 0 {
            tracing::warn!(?direction, index, code, "Failed to describe device");
            continue;
        }

        devices.push(Device {
            name: c_buffer_to_string(&name),
            hardware_id: c_buffer_to_string(&hardware_id),
            driver: DeviceDriver::from(kind),
        });
    }
    devices
}

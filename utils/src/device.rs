use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Returns the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host
            .default_input_device()
            .context("no default input device"),
        Some(target) => host
            .input_devices()
            .context("failed to enumerate input devices")?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("no input device named {target:?}")),
    }
}

/// Returns the named output device, or the host default when no name is given.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    match device_name {
        None => host
            .default_output_device()
            .context("no default output device"),
        Some(target) => host
            .output_devices()
            .context("failed to enumerate output devices")?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("no output device named {target:?}")),
    }
}

fn describe(name: &str, channels: u16, sample_rate: u32, is_default: bool) -> String {
    let mut d = format!(" * {}({}ch, {}hz)", name, channels, sample_rate);
    if is_default {
        d.push_str(" [default]");
    }
    d
}

pub fn get_available_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    for in_device in host.input_devices().context("no input devices found")? {
        let Ok(d_name) = in_device.name() else {
            continue;
        };
        let Ok(d_cfg) = in_device.default_input_config() else {
            tracing::debug!("Skipping input device without a default config: {}", d_name);
            continue;
        };
        let is_default = default_device.as_deref() == Some(d_name.as_str());
        device_names.push(describe(
            &d_name,
            d_cfg.channels(),
            d_cfg.sample_rate().0,
            is_default,
        ));
    }
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host.default_output_device().and_then(|d| d.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    for out_device in host.output_devices().context("no output devices found")? {
        let Ok(d_name) = out_device.name() else {
            continue;
        };
        let Ok(d_cfg) = out_device.default_output_config() else {
            tracing::debug!("Skipping output device without a default config: {}", d_name);
            continue;
        };
        let is_default = default_device.as_deref() == Some(d_name.as_str());
        device_names.push(describe(
            &d_name,
            d_cfg.channels(),
            d_cfg.sample_rate().0,
            is_default,
        ));
    }
    Ok(device_names.join("\n"))
}

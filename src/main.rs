use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rotary_encoder::{
    config::{Args, Config},
    output::write_action,
    CancelToken, InputPin, RotaryEncoder, SysfsPin,
};
use std::{io, sync::Arc, thread};

fn main() -> Result<()> {
    let config = Args::parse().resolve()?;
    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or(config.log_level.to_string()),
    );
    info!("{:?}", config);

    let encoder = encoder(&config);
    let cancel = CancelToken::new();

    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            info!("interrupt caught, stopping");
            cancel.cancel();
        })
        .context("could not install signal handler")?;
    }

    if config.once {
        if let Some(action) = encoder.read(&cancel)? {
            write_action(&mut io::stdout(), config.format, action)?;
        }
        return Ok(());
    }

    let (tx, rx) = crossbeam_channel::bounded(0);
    thread::scope(|s| {
        let watchers = s.spawn(|| encoder.run(&cancel, tx));

        // Print the actions until the encoder closes the channel
        let mut stdout = io::stdout();
        let mut printed = Ok(());
        for action in rx.iter() {
            info!("action received: {}", action);
            if let Err(err) = write_action(&mut stdout, config.format, action) {
                printed = Err(err);
                cancel.cancel();
                break;
            }
        }
        drop(rx);

        let watched = match watchers.join() {
            Ok(result) => result.context("rotary encoder failed"),
            Err(_) => Err(anyhow::anyhow!("rotary encoder thread panicked")),
        };
        info!("rotary encoder done");
        watched.and(printed.context("could not print action"))
    })
}

fn encoder(config: &Config) -> RotaryEncoder {
    let pin = |num: u64| -> Arc<dyn InputPin> { Arc::new(SysfsPin::new(num)) };

    let encoder = RotaryEncoder::new(pin(config.pin_a), pin(config.pin_b))
        .with_timeout(config.timeout)
        .with_channel_order(config.order);

    match config.button {
        Some(button) => encoder.with_button(pin(button), config.polarity),
        None => encoder,
    }
}

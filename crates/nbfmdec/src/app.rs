//! Sample pump: I/Q in, audio out

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use anyhow::Context;
use byteorder::{NativeEndian, WriteBytesExt};
use log::{debug, warn};

use trunkrx::NbfmDecoder;

// Complex samples per input buffer
const BUFFER_SAMPLES: usize = 2048;

/// Pump I/Q samples through the decoder until the source is dry
///
/// `samples` must yield interleaved i16 I/Q values. Demodulated
/// audio is written to standard output as signed 16-bit
/// native-endian samples at the configured audio rate.
pub fn run<I>(decoder: &mut NbfmDecoder, samples: I) -> Result<(), anyhow::Error>
where
    I: Iterator<Item = i16>,
{
    // the audio listener runs inside the decoder, so failures are
    // carried out through a shared slot
    let write_error: Rc<RefCell<Option<io::Error>>> = Rc::new(RefCell::new(None));
    let listener_error = Rc::clone(&write_error);
    let writer = Rc::new(RefCell::new(io::BufWriter::new(io::stdout())));
    let listener_writer = Rc::clone(&writer);

    decoder.set_buffer_listener(move |audio| {
        if listener_error.borrow().is_some() {
            return;
        }
        let mut writer = listener_writer.borrow_mut();
        for &sample in audio.samples() {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            if let Err(err) = writer.write_i16::<NativeEndian>(value) {
                *listener_error.borrow_mut() = Some(err);
                return;
            }
        }
    });

    let mut pairs = samples.peekable();
    let mut buffer_count = 0u64;
    while pairs.peek().is_some() {
        let mut buffer = decoder.pool().take_complex(BUFFER_SAMPLES);
        let mut filled = 0;
        {
            let storage = buffer.samples_mut();
            while filled < storage.len() {
                match pairs.next() {
                    Some(value) => {
                        storage[filled] = value as f32 / -(i16::MIN as f32);
                        filled += 1;
                    }
                    None => break,
                }
            }
        }

        if filled == 0 {
            break;
        }
        if filled % 2 != 0 {
            warn!("discarding trailing inphase sample with no quadrature");
        }

        decoder.receive(buffer).context("demodulation failed")?;
        buffer_count += 1;

        if let Some(err) = write_error.borrow_mut().take() {
            // a closed pipe is the normal way for a consumer to
            // hang up on us
            if err.kind() == io::ErrorKind::BrokenPipe {
                debug!("audio consumer hung up");
                break;
            }
            return Err(err).context("writing audio output");
        }
    }

    decoder.remove_buffer_listener();
    writer
        .borrow_mut()
        .flush()
        .context("flushing audio output")?;
    debug!("processed {} buffers", buffer_count);

    Ok(())
}

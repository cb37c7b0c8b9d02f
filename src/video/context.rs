//! Ordered locking of the decoder state and the GPU device
//!
//! Both locks are always taken together: decoder first, device second. The
//! device mutex is only reachable through a [`DecoderGuard`], so the reverse
//! order cannot be written.

use parking_lot::{Mutex, MutexGuard};

/// Decoder state and GPU device shared between the delivery thread and the
/// control thread
pub struct SharedContext<D, G> {
    decoder: Mutex<D>,
    device: Mutex<G>,
}

impl<D, G> SharedContext<D, G> {
    pub fn new(decoder: D, device: G) -> Self {
        Self {
            decoder: Mutex::new(decoder),
            device: Mutex::new(device),
        }
    }

    /// Take the decoder lock only
    pub fn lock_decoder(&self) -> DecoderGuard<'_, D, G> {
        DecoderGuard {
            decoder: self.decoder.lock(),
            device: &self.device,
        }
    }

    /// Take both locks in order
    pub fn lock(&self) -> ContextGuard<'_, D, G> {
        self.lock_decoder().lock_device()
    }

    pub fn into_inner(self) -> (D, G) {
        (self.decoder.into_inner(), self.device.into_inner())
    }
}

/// Holds the decoder lock; the device lock can be added on top
pub struct DecoderGuard<'a, D, G> {
    decoder: MutexGuard<'a, D>,
    device: &'a Mutex<G>,
}

impl<'a, D, G> DecoderGuard<'a, D, G> {
    pub fn decoder(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn lock_device(self) -> ContextGuard<'a, D, G> {
        let device = self.device.lock();
        ContextGuard {
            device,
            decoder: self.decoder,
        }
    }
}

/// Holds both locks. Fields drop in declaration order, releasing the device
/// before the decoder.
pub struct ContextGuard<'a, D, G> {
    device: MutexGuard<'a, G>,
    decoder: MutexGuard<'a, D>,
}

impl<D, G> ContextGuard<'_, D, G> {
    pub fn decoder(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn device(&mut self) -> &mut G {
        &mut self.device
    }

    /// Borrow both sides at once
    pub fn split(&mut self) -> (&mut D, &mut G) {
        (&mut self.decoder, &mut self.device)
    }
}

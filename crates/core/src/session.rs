//! Device session: owns the callback registration, input state, and LCD frame.
//!
//! Data flow:
//!   driver thread → callback → [`EventNormalizer`] → {[`InputStateCache`], event queue}
//!   application → [`FrameBuffer`] → [`DisplayDriver::tick`] → LCD SDK
//!
//! The vendor SDK accepts exactly one G-key callback per process, so at most
//! one session may be open at a time.

use crate::clock::{MonotonicClock, SystemClock};
use crate::config::SessionConfig;
use crate::display::{DisplayDriver, TickOutcome};
use crate::error::{DriverError, FrameError, OpenError};
use crate::frame::FrameBuffer;
use crate::gkey::{CanonicalEvent, DeviceKind, GkeyCode, ModeId, RawEvent};
use crate::normalizer::EventNormalizer;
use crate::sdk::{GkeyCallback, GkeySdk, LcdButton, LcdSdk, LcdType};
use crate::state_cache::{InputStateCache, KeyState};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the process-wide session slot; releasing happens on drop.
struct SessionSlot;

impl SessionSlot {
    fn acquire() -> Option<Self> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionSlot)
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

/// Counters for the callback path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Events that passed the normalizer and reached the cache and queue.
    pub emitted: u64,
    /// Events removed by debouncing.
    pub suppressed: u64,
    /// Queued events discarded because the queue was full.
    pub dropped: u64,
    /// Callbacks that arrived after close began.
    pub stale: u64,
    /// Codes with an invalid mode field.
    pub malformed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    emitted: AtomicU64,
    suppressed: AtomicU64,
    dropped: AtomicU64,
    stale: AtomicU64,
    malformed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// State reachable from the driver callback.
struct Shared {
    closed: AtomicBool,
    in_flight: AtomicUsize,
    clock: Arc<dyn MonotonicClock>,
    normalizer: EventNormalizer,
    cache: InputStateCache,
    tx: RwLock<Option<Sender<CanonicalEvent>>>,
    /// Producer-side receiver used to evict the oldest event on overflow.
    evict_rx: Receiver<CanonicalEvent>,
    counters: Counters,
}

/// Marks a callback as running. The counter and `closed` are paired in a
/// store-then-load handshake with [`DeviceSession::close`], so both sides use
/// `SeqCst`.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Shared {
    /// Driver-thread entry point. Never blocks on application locks and never panics.
    fn on_callback(&self, code: GkeyCode, driver_label: Option<&str>) {
        let _in_flight = InFlight::enter(&self.in_flight);
        if self.is_closed() {
            Counters::bump(&self.counters.stale);
            trace!(code = format_args!("0x{:08X}", code.0), "Stale G-key callback");
            return;
        }

        let captured_at_ms = self.clock.now_ms();
        let Some(raw) = RawEvent::decode(code, captured_at_ms) else {
            Counters::bump(&self.counters.malformed);
            warn!(code = format_args!("0x{:08X}", code.0), "G-key code with invalid mode");
            return;
        };

        let Some(evt) = self.normalizer.normalize(&raw, driver_label) else {
            Counters::bump(&self.counters.suppressed);
            return;
        };
        if self.is_closed() {
            Counters::bump(&self.counters.stale);
            return;
        }
        Counters::bump(&self.counters.emitted);
        self.cache.update(&evt);
        debug!(
            device = ?evt.device,
            index = evt.index,
            pressed = evt.pressed,
            mode = %evt.mode,
            label = %evt.label,
            "G-key event"
        );

        let tx = self.tx.read().clone();
        if let Some(tx) = tx {
            self.enqueue(&tx, evt);
        }
    }

    fn enqueue(&self, tx: &Sender<CanonicalEvent>, mut evt: CanonicalEvent) {
        loop {
            match tx.try_send(evt) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.evict_rx.try_recv().is_ok() {
                        Counters::bump(&self.counters.dropped);
                        debug!("Event queue full, dropped oldest event");
                    }
                    evt = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Application-side sequence of canonical events.
///
/// Yields nothing once the session has begun closing. Several streams from
/// one session compete for events rather than each seeing all of them.
pub struct EventStream {
    rx: Receiver<CanonicalEvent>,
    shared: Arc<Shared>,
}

impl EventStream {
    /// Next queued event without waiting.
    pub fn try_next(&mut self) -> Option<CanonicalEvent> {
        if self.shared.is_closed() {
            return None;
        }
        self.rx.try_recv().ok().filter(|_| !self.shared.is_closed())
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<CanonicalEvent> {
        if self.shared.is_closed() {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(evt) if !self.shared.is_closed() => Some(evt),
            Ok(_) | Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Events currently queued.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Iterator for EventStream {
    type Item = CanonicalEvent;

    /// Blocks until an event arrives or the session closes.
    fn next(&mut self) -> Option<CanonicalEvent> {
        if self.shared.is_closed() {
            return None;
        }
        self.rx.recv().ok().filter(|_| !self.shared.is_closed())
    }
}

/// An open G-key (and optionally LCD) session.
pub struct DeviceSession {
    shared: Arc<Shared>,
    gkey: Arc<dyn GkeySdk>,
    lcd: Arc<dyn LcdSdk>,
    config: SessionConfig,
    frame: Option<FrameBuffer>,
    display: Option<DisplayDriver>,
    rx: Receiver<CanonicalEvent>,
    button_latched: bool,
    slot: Option<SessionSlot>,
}

impl DeviceSession {
    /// Open a session with the system monotonic clock.
    pub fn open(
        config: SessionConfig,
        gkey: Arc<dyn GkeySdk>,
        lcd: Arc<dyn LcdSdk>,
    ) -> Result<Self, OpenError> {
        Self::open_with_clock(config, gkey, lcd, Arc::new(SystemClock::new()))
    }

    /// Open a session stamping events with `clock`.
    ///
    /// Registers the G-key callback, then (unless `lcd_type` is `None`)
    /// initializes the LCD and checks the requested panel is connected.
    pub fn open_with_clock(
        config: SessionConfig,
        gkey: Arc<dyn GkeySdk>,
        lcd: Arc<dyn LcdSdk>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Result<Self, OpenError> {
        config
            .validate()
            .map_err(|e| OpenError::Config(e.to_string()))?;
        let slot = SessionSlot::acquire().ok_or(OpenError::SessionActive)?;

        let (tx, rx) = channel::bounded(config.queue_capacity);
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            clock,
            normalizer: EventNormalizer::new(Arc::clone(&gkey), config.debounce_millis),
            cache: InputStateCache::new(),
            tx: RwLock::new(Some(tx)),
            evict_rx: rx.clone(),
            counters: Counters::default(),
        });

        let weak = Arc::downgrade(&shared);
        let callback: GkeyCallback = Arc::new(move |code: GkeyCode, label: Option<&str>| {
            match weak.upgrade() {
                Some(shared) => shared.on_callback(code, label),
                None => trace!("G-key callback after session was dropped"),
            }
        });
        if !gkey.init(callback) {
            warn!("LogiGkeyInit failed");
            return Err(OpenError::GkeyInit);
        }

        let lcd_type = config.lcd_type;
        let (frame, display) = if lcd_type == LcdType::None {
            (None, None)
        } else {
            if !lcd.init(&config.applet_name, lcd_type) {
                warn!(applet = %config.applet_name, "LogiLcdInit failed");
                gkey.shutdown();
                return Err(OpenError::LcdInit(config.applet_name.clone()));
            }
            if !lcd.is_connected(lcd_type) {
                warn!(lcd = %lcd_type, "Requested LCD type not connected");
                lcd.shutdown();
                gkey.shutdown();
                return Err(OpenError::LcdNotConnected(lcd_type));
            }
            (
                FrameBuffer::new(lcd_type).ok(),
                Some(DisplayDriver::new(Arc::clone(&lcd), lcd_type)),
            )
        };

        info!(
            applet = %config.applet_name,
            lcd = %lcd_type,
            debounce_ms = config.debounce_millis,
            queue_capacity = config.queue_capacity,
            "Device session opened"
        );

        Ok(Self {
            shared,
            gkey,
            lcd,
            config,
            frame,
            display,
            rx,
            button_latched: false,
            slot: Some(slot),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lcd_type(&self) -> LcdType {
        self.config.lcd_type
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stream of canonical events. Empty once the session is closed.
    pub fn event_stream(&self) -> EventStream {
        EventStream {
            rx: self.rx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Mode carried by the most recent G-key event.
    pub fn current_mode(&self) -> ModeId {
        self.shared.normalizer.current_mode()
    }

    /// Last-known state from delivered events; `false` if never seen.
    pub fn is_pressed(&self, device: DeviceKind, index: u8, mode: ModeId) -> bool {
        self.shared.cache.query(device, index, mode)
    }

    pub fn key_state(&self, device: DeviceKind, index: u8, mode: ModeId) -> Option<KeyState> {
        self.shared.cache.get(device, index, mode)
    }

    /// Ask the driver directly instead of the cache.
    pub fn hardware_pressed(&self, device: DeviceKind, index: u8, mode: ModeId) -> bool {
        if self.is_closed() {
            return false;
        }
        match device {
            DeviceKind::Key => self.gkey.is_keyboard_gkey_pressed(index, mode.number()),
            DeviceKind::Mouse => self.gkey.is_mouse_button_pressed(index),
        }
    }

    /// Level state of an LCD soft button.
    pub fn poll_button(&self, button: LcdButton) -> bool {
        if self.is_closed() || self.display.is_none() {
            return false;
        }
        self.lcd.is_button_pressed(button)
    }

    /// First of `buttons` pressed since none were held; `None` while held.
    pub fn poll_new_press(&mut self, buttons: &[LcdButton]) -> Option<LcdButton> {
        match buttons.iter().copied().find(|b| self.poll_button(*b)) {
            Some(button) if !self.button_latched => {
                self.button_latched = true;
                Some(button)
            }
            Some(_) => None,
            None => {
                self.button_latched = false;
                None
            }
        }
    }

    /// Pending frame to draw into.
    pub fn frame(&mut self) -> Result<&mut FrameBuffer, FrameError> {
        self.frame.as_mut().ok_or(FrameError::NoDisplay)
    }

    /// Push pending frame changes. Call every 60–250 ms.
    pub fn tick(&mut self) -> Result<TickOutcome, DriverError> {
        if self.is_closed() {
            return Ok(TickOutcome::Skipped);
        }
        match (&self.display, &mut self.frame) {
            (Some(display), Some(frame)) => display.tick(frame),
            _ => Ok(TickOutcome::Skipped),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    /// Unregister the callback and shut both SDKs down. Idempotent.
    ///
    /// Waits up to `close_grace_millis` for a callback already running on the
    /// driver thread. Whatever it produces is discarded; no event is yielded
    /// by any [`EventStream`] after this returns.
    pub fn close(&mut self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let grace = Duration::from_millis(self.config.close_grace_millis);
        let deadline = Instant::now() + grace;
        while self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                warn!(grace_ms = self.config.close_grace_millis, "G-key callback still running at close");
                break;
            }
            std::thread::yield_now();
        }

        self.shared.tx.write().take();
        let discarded = self.shared.evict_rx.try_iter().count();

        self.gkey.shutdown();
        if self.display.is_some() {
            self.lcd.shutdown();
        }
        self.slot.take();

        info!(discarded, stats = ?self.stats(), "Device session closed");
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

//! Host side of the platform service table
//!
//! [`PlatformServices`] is the context behind every `PlatformApi` slot.
//! The engine core calls these slots synchronously while the runtime holds
//! its module lock, so nothing here may call back into the module.

use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, UNIX_EPOCH};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use strata_abi::*;
use strata_memory::Region;

/// Target that engine core log messages are forwarded under
pub const ENGINE_LOG_TARGET: &str = "strata_engine";

/// Last write time of a file in nanoseconds since the Unix epoch, 0 if missing
pub fn file_last_write_time(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |since| since.as_nanos() as u64)
}

/// A committed transaction as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedTransaction {
    /// Position in publish order, starting at 1
    pub sequence: u64,
    pub commands: Vec<Command>,
}

/// How an announced asset's data is sourced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AssetSource {
    File {
        relative_path: String,
        last_write_time: u64,
        is_up_to_date: bool,
        is_load_queued: bool,
    },
    Composite {
        components: Vec<u32>,
    },
    Virtual,
}

/// Owned copy of an asset registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRegistrationEvent {
    pub id: u32,
    pub registration_type: RegistrationType,
    pub asset_type: AssetType,
    pub version: u32,
    pub data_size: u64,
    pub source: AssetSource,
}

impl AssetRegistrationEvent {
    /// Copy out everything observers need before the record goes away
    ///
    /// # Safety
    /// `registration` and the pointers inside it must be valid for the
    /// duration of the call.
    pub unsafe fn copy_from(registration: &AssetRegistration) -> Option<Self> {
        let registration_type = RegistrationType::from_raw(registration.registration_type)?;
        let asset_type = registration
            .metadata
            .as_ref()
            .map_or(AssetType::Unknown, |meta| AssetType::from_raw(meta.asset_type));

        let source = match registration_type {
            RegistrationType::File => {
                let state = (registration.state as *const FileAssetState).as_ref()?;
                AssetSource::File {
                    relative_path: state.relative_path.as_str().unwrap_or_default().to_string(),
                    last_write_time: state.last_write_time,
                    is_up_to_date: state.is_up_to_date,
                    is_load_queued: state.is_load_queued,
                }
            }
            RegistrationType::Composite => {
                let state = (registration.state as *const CompositeAssetState).as_ref()?;
                AssetSource::Composite {
                    components: state.components().to_vec(),
                }
            }
            RegistrationType::Virtual => AssetSource::Virtual,
        };

        Some(Self {
            id: registration.id,
            registration_type,
            asset_type,
            version: registration.loaded_asset.version,
            data_size: registration.loaded_asset.size,
            source,
        })
    }
}

/// An asset file the engine core asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLoadRequest {
    pub asset_id: u32,
    pub relative_path: String,
}

/// Aggregated timings of one named perf counter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerfStats {
    pub name: String,
    pub count: u64,
    pub total: Duration,
    pub last: Duration,
}

#[derive(Default)]
struct PerfCounter {
    count: u64,
    total: Duration,
    last: Duration,
    started: Option<Instant>,
}

/// Copy of the last published command buffer, kept in the editor region
struct ReplayBuffer {
    base: *mut u8,
    size: usize,
    sequence: u64,
}

// Safety: the region outlives the services and is only touched under the
// replay mutex
unsafe impl Send for ReplayBuffer {}

impl ReplayBuffer {
    fn store(&mut self, bytes: &[u8], sequence: u64) -> bool {
        if self.base.is_null() || bytes.len() > self.size {
            return false;
        }
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base, bytes.len()) };
        self.sequence = sequence;
        true
    }

    fn bytes(&self) -> Option<&[u8]> {
        (self.sequence != 0 && !self.base.is_null())
            .then(|| unsafe { std::slice::from_raw_parts(self.base, self.size) })
    }
}

/// Host services behind the platform table
pub struct PlatformServices {
    assets_root: PathBuf,
    load_queue: Mutex<VecDeque<AssetLoadRequest>>,
    /// Asset bytes handed to the engine core, kept alive until replaced
    loaded_assets: Mutex<HashMap<u32, Box<[u8]>>>,
    perf: Mutex<HashMap<String, PerfCounter>>,
    transaction_subscribers: Mutex<Vec<Sender<PublishedTransaction>>>,
    asset_subscribers: Mutex<Vec<Sender<AssetRegistrationEvent>>>,
    replay: Mutex<ReplayBuffer>,
    last_published: Mutex<Option<PublishedTransaction>>,
    publish_sequence: AtomicU64,
}

impl PlatformServices {
    /// Create services resolving asset paths against `assets_root`
    ///
    /// The editor region, when given, stores the last published buffer.
    pub fn new(assets_root: impl Into<PathBuf>, editor_region: Option<Region>) -> Self {
        let replay = editor_region.map_or(
            ReplayBuffer {
                base: std::ptr::null_mut(),
                size: 0,
                sequence: 0,
            },
            |region| ReplayBuffer {
                base: region.base,
                size: region.size as usize,
                sequence: 0,
            },
        );

        Self {
            assets_root: assets_root.into(),
            load_queue: Mutex::new(VecDeque::new()),
            loaded_assets: Mutex::new(HashMap::new()),
            perf: Mutex::new(HashMap::new()),
            transaction_subscribers: Mutex::new(Vec::new()),
            asset_subscribers: Mutex::new(Vec::new()),
            replay: Mutex::new(replay),
            last_published: Mutex::new(None),
            publish_sequence: AtomicU64::new(0),
        }
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    /// Resolve a path the engine core passed relative to the assets root
    pub fn resolve(&self, relative_path: &str) -> PathBuf {
        self.assets_root.join(relative_path)
    }

    /// Build the table handed to the engine core
    ///
    /// `self` must stay at the same address for as long as the table is in
    /// use.
    pub fn platform_api(&self) -> PlatformApi {
        PlatformApi {
            host: self as *const Self as *mut c_void,
            log: host_log,
            start_perf_counter: host_start_perf_counter,
            end_perf_counter: host_end_perf_counter,
            get_file_last_write_time: host_get_file_last_write_time,
            read_entire_file: host_read_entire_file,
            release_file: host_release_file,
            write_entire_file: host_write_entire_file,
            queue_asset_load: host_queue_asset_load,
            notify_asset_registered: host_notify_asset_registered,
            publish_transaction: host_publish_transaction,
        }
    }

    // ========== Observers ==========

    /// Receive every transaction published from now on
    pub fn subscribe_transactions(&self) -> Receiver<PublishedTransaction> {
        let (tx, rx) = unbounded();
        self.transaction_subscribers.lock().push(tx);
        rx
    }

    /// Receive every asset registration announced from now on
    pub fn subscribe_assets(&self) -> Receiver<AssetRegistrationEvent> {
        let (tx, rx) = unbounded();
        self.asset_subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.transaction_subscribers.lock().len() + self.asset_subscribers.lock().len()
    }

    fn broadcast<T: Clone>(subscribers: &Mutex<Vec<Sender<T>>>, event: &T) {
        subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ========== Transactions ==========

    fn publish(&self, bytes: Vec<u8>) {
        let commands = match CommandReader::new(&bytes).and_then(|reader| reader.decode_all()) {
            Ok(commands) => commands,
            Err(e) => {
                log::error!("Dropping undecodable published transaction: {}", e);
                return;
            }
        };

        let sequence = self.publish_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.replay.lock().store(&bytes, sequence) {
            log::warn!(
                "Published transaction of {} bytes does not fit the editor region",
                bytes.len()
            );
        }

        let published = PublishedTransaction { sequence, commands };
        log::debug!(
            "Transaction {} published with {} commands",
            sequence,
            published.commands.len()
        );
        Self::broadcast(&self.transaction_subscribers, &published);
        *self.last_published.lock() = Some(published);
    }

    /// Number of transactions published so far
    pub fn publish_count(&self) -> u64 {
        self.publish_sequence.load(Ordering::SeqCst)
    }

    /// Most recent transaction, if published after `sequence`
    pub fn published_since(&self, sequence: u64) -> Option<PublishedTransaction> {
        self.last_published
            .lock()
            .as_ref()
            .filter(|published| published.sequence > sequence)
            .cloned()
    }

    /// Decode the last published buffer again from the editor region
    pub fn replay_last_transaction(&self) -> strata_abi::Result<Option<PublishedTransaction>> {
        let replay = self.replay.lock();
        let Some(bytes) = replay.bytes() else {
            return Ok(None);
        };
        let commands = CommandReader::new(bytes)?.decode_all()?;
        Ok(Some(PublishedTransaction {
            sequence: replay.sequence,
            commands,
        }))
    }

    // ========== Asset loads ==========

    fn queue_load(&self, request: AssetLoadRequest) {
        let mut queue = self.load_queue.lock();
        if !queue.iter().any(|queued| queued.asset_id == request.asset_id) {
            log::debug!("Queued load of asset {} ({})", request.asset_id, request.relative_path);
            queue.push_back(request);
        }
    }

    /// Take every pending load request
    pub fn take_load_requests(&self) -> Vec<AssetLoadRequest> {
        self.load_queue.lock().drain(..).collect()
    }

    /// Put failed requests back for the next tick
    pub fn requeue(&self, requests: impl IntoIterator<Item = AssetLoadRequest>) {
        for request in requests {
            self.queue_load(request);
        }
    }

    pub fn pending_loads(&self) -> Vec<AssetLoadRequest> {
        self.load_queue.lock().iter().cloned().collect()
    }

    /// Keep delivered asset bytes alive, releasing the previous copy
    pub fn retain_asset_data(&self, asset_id: u32, data: Box<[u8]>) {
        self.loaded_assets.lock().insert(asset_id, data);
    }

    // ========== Perf counters ==========

    fn start_counter(&self, name: &str) {
        let mut perf = self.perf.lock();
        perf.entry(name.to_string()).or_default().started = Some(Instant::now());
    }

    fn end_counter(&self, name: &str) {
        let mut perf = self.perf.lock();
        let Some(counter) = perf.get_mut(name) else {
            return;
        };
        if let Some(started) = counter.started.take() {
            let elapsed = started.elapsed();
            counter.count += 1;
            counter.total += elapsed;
            counter.last = elapsed;
        }
    }

    /// Snapshot of every counter, sorted by name
    pub fn perf_report(&self) -> Vec<PerfStats> {
        let mut report: Vec<PerfStats> = self
            .perf
            .lock()
            .iter()
            .map(|(name, counter)| PerfStats {
                name: name.clone(),
                count: counter.count,
                total: counter.total,
                last: counter.last,
            })
            .collect();
        report.sort_by(|a, b| a.name.cmp(&b.name));
        report
    }
}

// ============================================================================
// Platform table slots
// ============================================================================

fn services<'a>(host: *mut c_void) -> &'a PlatformServices {
    unsafe { &*(host as *const PlatformServices) }
}

fn path_arg<'a>(path: FfiStr) -> Option<&'a str> {
    let path = unsafe { path.as_str() };
    if path.is_none() {
        log::warn!("Engine core passed a path that is not UTF-8");
    }
    path
}

extern "C" fn host_log(_host: *mut c_void, level: u32, message: FfiStr) {
    let message = unsafe { message.as_str() }.unwrap_or("<invalid utf-8>");
    let level = match LogLevel::from_raw(level) {
        LogLevel::Error => log::Level::Error,
        LogLevel::Warn => log::Level::Warn,
        LogLevel::Info => log::Level::Info,
        LogLevel::Debug => log::Level::Debug,
        LogLevel::Trace => log::Level::Trace,
    };
    log::log!(target: ENGINE_LOG_TARGET, level, "{}", message);
}

extern "C" fn host_start_perf_counter(host: *mut c_void, name: FfiStr) {
    if let Some(name) = unsafe { name.as_str() } {
        services(host).start_counter(name);
    }
}

extern "C" fn host_end_perf_counter(host: *mut c_void, name: FfiStr) {
    if let Some(name) = unsafe { name.as_str() } {
        services(host).end_counter(name);
    }
}

extern "C" fn host_get_file_last_write_time(host: *mut c_void, path: FfiStr) -> u64 {
    path_arg(path).map_or(0, |path| file_last_write_time(&services(host).resolve(path)))
}

extern "C" fn host_read_entire_file(host: *mut c_void, path: FfiStr, out: *mut FileBuffer) -> bool {
    let (Some(path), Some(out)) = (path_arg(path), unsafe { out.as_mut() }) else {
        return false;
    };
    match std::fs::read(services(host).resolve(path)) {
        Ok(bytes) => {
            let len = bytes.len() as u64;
            out.data = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
            out.len = len;
            true
        }
        Err(e) => {
            log::debug!("Cannot read '{}': {}", path, e);
            *out = FileBuffer::empty();
            false
        }
    }
}

extern "C" fn host_release_file(_host: *mut c_void, buffer: *mut FileBuffer) {
    let Some(buffer) = (unsafe { buffer.as_mut() }) else {
        return;
    };
    if !buffer.data.is_null() {
        let bytes = std::ptr::slice_from_raw_parts_mut(buffer.data, buffer.len as usize);
        drop(unsafe { Box::from_raw(bytes) });
    }
    *buffer = FileBuffer::empty();
}

extern "C" fn host_write_entire_file(host: *mut c_void, path: FfiStr, data: *const u8, len: u64) -> bool {
    let Some(path) = path_arg(path) else {
        return false;
    };
    let bytes = if data.is_null() {
        &[][..]
    } else {
        unsafe { std::slice::from_raw_parts(data, len as usize) }
    };

    let target = services(host).resolve(path);
    let result = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
    .and_then(|()| std::fs::write(&target, bytes));

    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Cannot write '{}': {}", target.display(), e);
            false
        }
    }
}

extern "C" fn host_queue_asset_load(host: *mut c_void, asset_id: u32, path: FfiStr) {
    if let Some(path) = path_arg(path) {
        services(host).queue_load(AssetLoadRequest {
            asset_id,
            relative_path: path.to_string(),
        });
    }
}

extern "C" fn host_notify_asset_registered(host: *mut c_void, registration: *const AssetRegistration) {
    let Some(registration) = (unsafe { registration.as_ref() }) else {
        return;
    };
    match unsafe { AssetRegistrationEvent::copy_from(registration) } {
        Some(event) => {
            log::debug!("Asset {} registered at version {}", event.id, event.version);
            PlatformServices::broadcast(&services(host).asset_subscribers, &event);
        }
        None => log::warn!("Ignoring malformed registration for asset {}", registration.id),
    }
}

extern "C" fn host_publish_transaction(host: *mut c_void, buffer: *const u8) {
    match unsafe { CommandReader::from_raw(buffer) } {
        Ok(reader) => services(host).publish(reader.to_owned_bytes()),
        Err(e) => log::error!("Engine core published an invalid buffer: {}", e),
    }
}

//! Tracking store: the flow-queue work-list and its container lifecycle.

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use ndarray::{Array2, ArrayView2};
use rusqlite::Connection;
use tracing::{Span, debug, info, info_span, warn};

use crate::tracking::container;
use crate::tracking::error::{Result, TrackingError};
use crate::tracking::flow_queue::FlowQueue;
use crate::tracking::marker_positions::MarkerPositions;
use crate::tracking::query::QueueFilter;
use crate::tracking::store_state::StoreState;
use crate::tracking::trajectory::TrajectoryRepository;

/// Containers currently acquired by a store in this process.
static ACQUIRED_CONTAINERS: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

fn claim_container(path: &Path) -> bool {
    ACQUIRED_CONTAINERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(path.to_path_buf())
}

fn release_container(path: &Path) {
    ACQUIRED_CONTAINERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(path);
}

/// Configuration for the tracking store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Dataset name under each trajectory group.
    pub prefix: String,
    /// Unit-of-measure attribute written on new datasets.
    pub unit: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: "xy".to_string(),
            unit: "pixel".to_string(),
        }
    }
}

/// Ordered collection of flow queues backed by a container file.
///
/// Queries and mutations are only allowed between [`enter`](Self::enter) and
/// [`exit`](Self::exit), or while a [`TrackingSession`] is alive. Queue
/// changes stay in memory until release; trajectory writes hit the container
/// immediately.
#[derive(Debug)]
pub struct TrackingStore {
    path: PathBuf,
    queues: Vec<FlowQueue>,
    marker_positions: MarkerPositions,
    config: StoreConfig,
    state: StoreState,
    connection: Option<Connection>,
    claimed: Option<PathBuf>,
    span: Span,
}

impl TrackingStore {
    /// Empty store for a container that may not exist yet.
    pub fn new(path: impl Into<PathBuf>, marker_positions: MarkerPositions) -> Self {
        let path = path.into();
        let span = info_span!("tracking_store", path = %path.display());
        Self {
            path,
            queues: Vec::new(),
            marker_positions,
            config: StoreConfig::default(),
            state: StoreState::Unopened,
            connection: None,
            claimed: None,
            span,
        }
    }

    /// Load the container at `path` if present, otherwise start empty.
    ///
    /// An existing container keeps its own marker positions; the ones passed
    /// in are only used for a new container.
    pub fn initialize(path: impl Into<PathBuf>, marker_positions: MarkerPositions) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            return Self::load(path);
        }
        Ok(Self::new(path, marker_positions))
    }

    /// Load queues and marker positions from an existing container.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(TrackingError::ContainerNotFound(path));
        }

        let conn = container::open_read_only(&path)?;
        let marker_positions = container::read_marker_positions(&conn)?;
        let queues = container::read_queues(&conn)?;

        let mut store = Self::new(path, marker_positions);
        info!(parent: &store.span, queues = queues.len(), "loaded tracking container");
        store.queues = queues;
        Ok(store)
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Log under `span` instead of the store's own span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn marker_positions(&self) -> &MarkerPositions {
        &self.marker_positions
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_acquired(&self) -> bool {
        self.state == StoreState::Acquired
    }

    /// Acquire exclusive access, creating the container if it is missing.
    pub fn enter(&mut self) -> Result<()> {
        if self.is_acquired() {
            return Err(TrackingError::AlreadyAcquired {
                path: self.path.clone(),
            });
        }

        let key = std::path::absolute(&self.path)?;
        if !claim_container(&key) {
            return Err(TrackingError::AlreadyAcquired { path: key });
        }

        match self.open_container() {
            Ok(conn) => {
                self.connection = Some(conn);
                self.claimed = Some(key);
                self.state = StoreState::Acquired;
                info!(parent: &self.span, queues = self.queues.len(), "acquired tracking container");
                Ok(())
            }
            Err(error) => {
                release_container(&key);
                Err(error)
            }
        }
    }

    fn open_container(&self) -> Result<Connection> {
        if !self.path.exists() {
            container::create_template(&self.path, &self.marker_positions)?;
            info!(parent: &self.span, "created container template");
        }
        container::open(&self.path)
    }

    /// Flush the queue table and release the container.
    ///
    /// The store leaves the acquired state even when the flush fails; the
    /// in-memory queues are kept so a later acquisition can retry.
    pub fn exit(&mut self) -> Result<()> {
        if !self.is_acquired() {
            return Err(TrackingError::NotAcquired);
        }

        let flushed = match self.connection.as_mut() {
            Some(conn) => container::write_queues(conn, &self.queues),
            None => Err(TrackingError::NotAcquired),
        };
        self.connection = None;
        if let Some(key) = self.claimed.take() {
            release_container(&key);
        }
        self.state = StoreState::Released;

        if flushed.is_ok() {
            info!(parent: &self.span, queues = self.queues.len(), "released tracking container");
        }
        flushed
    }

    /// Acquire the store for the lifetime of the returned session.
    pub fn session(&mut self) -> Result<TrackingSession<'_>> {
        self.enter()?;
        Ok(TrackingSession { store: self })
    }

    fn connection(&self) -> Result<&Connection> {
        match (&self.connection, self.state) {
            (Some(conn), StoreState::Acquired) => Ok(conn),
            _ => Err(TrackingError::NotAcquired),
        }
    }

    /// All queues in persisted order.
    pub fn queues(&self) -> Result<&[FlowQueue]> {
        self.connection()?;
        Ok(&self.queues)
    }

    /// Insert `queue`, replacing an equal queue in place.
    ///
    /// Equality ignores `done`, so this is how progress is written back.
    pub fn append(&mut self, queue: FlowQueue) -> Result<()> {
        self.connection()?;
        match self.queues.iter().position(|existing| *existing == queue) {
            Some(index) => {
                debug!(parent: &self.span, index, tag = %queue.tag(), done = queue.done(), "replaced flow queue");
                self.queues[index] = queue;
            }
            None => {
                debug!(parent: &self.span, tag = %queue.tag(), camera = queue.camera(), "appended flow queue");
                self.queues.push(queue);
            }
        }
        Ok(())
    }

    /// Queues matching `filter`, in store order.
    pub fn get_flow_queues(&self, filter: &QueueFilter) -> Result<Vec<FlowQueue>> {
        self.connection()?;
        Ok(filter.select(&self.queues))
    }

    /// Distinct camera ids, ascending.
    pub fn iter_cameras(&self) -> Result<Vec<u32>> {
        self.connection()?;
        let cameras: BTreeSet<u32> = self.queues.iter().map(FlowQueue::camera).collect();
        Ok(cameras.into_iter().collect())
    }

    /// True when there is nothing left to track.
    pub fn all_done(&self) -> Result<bool> {
        self.connection()?;
        Ok(self.queues.iter().all(FlowQueue::done))
    }

    /// Trajectory access on the acquired container.
    pub fn trajectories(&self) -> Result<TrajectoryRepository<'_>> {
        Ok(TrajectoryRepository::new(
            self.connection()?,
            &self.config.unit,
        ))
    }

    /// Save `data` under the configured prefix. See [`TrajectoryRepository::save`].
    pub fn save_pixel_flow_trajectory(
        &self,
        data: ArrayView2<'_, i64>,
        queue: &FlowQueue,
        size: Option<usize>,
        full_trajectory: bool,
    ) -> Result<()> {
        self.trajectories()?
            .save(data, queue, size, &self.config.prefix, full_trajectory)
    }

    /// Load from the configured prefix. See [`TrajectoryRepository::load`].
    pub fn load_pixel_flow_trajectory(
        &self,
        queue: &FlowQueue,
        full_trajectory: bool,
    ) -> Result<Array2<i64>> {
        self.trajectories()?
            .load(queue, &self.config.prefix, full_trajectory)
    }

    /// Invalidate trajectory samples after `frame`, or before it when
    /// `reverse` is set, for the first queue with `tag` covering `frame`.
    ///
    /// The queue's span is adjusted in place and the adjusted queue returned.
    /// No matching queue is not an error: `Ok(None)` is returned and nothing
    /// changes.
    pub fn trim_trajectory(
        &mut self,
        tag: &str,
        frame: u32,
        reverse: bool,
    ) -> Result<Option<FlowQueue>> {
        self.connection()?;
        let Some(index) = self
            .queues
            .iter()
            .position(|queue| queue.tag() == tag && queue.covers(frame))
        else {
            debug!(parent: &self.span, tag, frame, "no flow queue to trim");
            return Ok(None);
        };

        let trimmed = self.trajectories()?.trim(
            &self.queues[index],
            frame,
            &self.config.prefix,
            reverse,
        )?;
        debug!(
            parent: &self.span,
            tag,
            frame,
            reverse,
            start_frame = trimmed.start_frame(),
            end_frame = trimmed.end_frame(),
            "trimmed trajectory"
        );
        self.queues[index] = trimmed.clone();
        Ok(Some(trimmed))
    }
}

impl Drop for TrackingStore {
    fn drop(&mut self) {
        if self.is_acquired() {
            if let Err(error) = self.exit() {
                warn!(parent: &self.span, %error, "failed to flush tracking store on drop");
            }
        }
    }
}

/// Scoped acquisition of a [`TrackingStore`], released on drop.
///
/// Use [`release`](Self::release) to observe flush errors; a failed flush on
/// drop is only logged.
#[derive(Debug)]
pub struct TrackingSession<'a> {
    store: &'a mut TrackingStore,
}

impl TrackingSession<'_> {
    /// Flush and release, reporting the flush result.
    pub fn release(self) -> Result<()> {
        self.store.exit()
    }
}

impl Deref for TrackingSession<'_> {
    type Target = TrackingStore;

    fn deref(&self) -> &TrackingStore {
        self.store
    }
}

impl DerefMut for TrackingSession<'_> {
    fn deref_mut(&mut self) -> &mut TrackingStore {
        self.store
    }
}

impl Drop for TrackingSession<'_> {
    fn drop(&mut self) {
        if self.store.is_acquired() {
            if let Err(error) = self.store.exit() {
                warn!(parent: &self.store.span, %error, "failed to flush tracking session on drop");
            }
        }
    }
}

//! Batches of independent windows, and the worker pool that processes them

use std::thread;

use tracing::{debug, debug_span, info, info_span, trace, warn, Level};

use crate::aligner::alignment::AlignedPair;
use crate::aligner::utils::print_alignment;
use crate::aligner::PoaAligner;
use crate::config::BatchConfig;
use crate::errors::{PoaBatchError, StatusType};
use crate::graphs::poa::POAGraph;
use crate::graphs::NodeIndex;
use crate::output::{generate_msa, heaviest_path_consensus, ConsensusBuffers, MsaBuffers};

/// Index of a window within its batch, in registration order
pub type WindowId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    /// Windows and reads can be added
    Open,

    /// All windows reached a terminal state, outputs can be queried
    Processed,
}

/// Per-thread processing state: the aligner and scratch space for output generation
struct Worker {
    aligner: PoaAligner,
    consensus_buffers: ConsensusBuffers,
    msa_buffers: MsaBuffers,
}

impl Worker {
    fn new(config: &BatchConfig) -> Self {
        Worker {
            aligner: PoaAligner::with_capacity(config.scoring, config.max_graph_rows(), config.max_sequence_size),
            consensus_buffers: ConsensusBuffers::with_capacity(config.max_graph_rows()),
            msa_buffers: MsaBuffers::with_capacity(config.max_graph_rows(), config.max_edges_per_window),
        }
    }
}

/// A set of reads to be folded into one graph, together with the resulting outputs.
///
/// Reads and their node paths are stored back to back in flat buffers. MSA rows past
/// `msa_rows` are spare storage kept for the next use of the window.
#[derive(Debug, Clone)]
pub struct Window {
    reads: Vec<u8>,
    read_bounds: Vec<usize>,

    graph: POAGraph,
    paths: Vec<NodeIndex>,
    path_bounds: Vec<usize>,
    path_buf: Vec<NodeIndex>,

    status: StatusType,
    consensus: Vec<u8>,
    msa: Vec<Vec<u8>>,
    msa_rows: usize,
}

impl Window {
    fn new(config: &BatchConfig) -> Self {
        let mut read_bounds = Vec::with_capacity(config.max_sequences_per_poa + 1);
        read_bounds.push(0);
        let mut path_bounds = Vec::with_capacity(config.max_sequences_per_poa + 1);
        path_bounds.push(0);

        let mut graph = POAGraph::with_capacity(config.max_nodes_per_window, config.max_edges_per_window);
        graph.reserve_sequence_capacity(config.max_sequence_size);

        let msa = if config.output_mode.has_msa() {
            (0..config.max_sequences_per_poa)
                .map(|_| Vec::with_capacity(config.max_nodes_per_window))
                .collect()
        } else {
            Vec::new()
        };

        Window {
            reads: Vec::with_capacity(config.max_sequences_per_poa * config.max_sequence_size),
            read_bounds,
            graph,
            paths: Vec::with_capacity(config.max_sequences_per_poa * config.max_sequence_size),
            path_bounds,
            path_buf: Vec::with_capacity(config.max_sequence_size),
            status: StatusType::Success,
            consensus: Vec::with_capacity(config.max_nodes_per_window),
            msa,
            msa_rows: 0,
        }
    }

    fn clear(&mut self) {
        self.reads.clear();
        self.read_bounds.truncate(1);
        self.graph.clear();
        self.paths.clear();
        self.path_bounds.truncate(1);
        self.status = StatusType::Success;
        self.consensus.clear();
        self.msa_rows = 0;
    }

    pub fn num_reads(&self) -> usize {
        self.read_bounds.len() - 1
    }

    pub fn read(&self, i: usize) -> &[u8] {
        &self.reads[self.read_bounds[i]..self.read_bounds[i + 1]]
    }

    /// The graph nodes the `i`-th read was folded into, one per read symbol
    pub fn path(&self, i: usize) -> &[NodeIndex] {
        &self.paths[self.path_bounds[i]..self.path_bounds[i + 1]]
    }

    pub fn graph(&self) -> &POAGraph {
        &self.graph
    }

    pub fn status(&self) -> StatusType {
        self.status
    }

    fn push_read(&mut self, read: &[u8]) {
        self.reads.extend_from_slice(read);
        self.read_bounds.push(self.reads.len());
    }

    /// Run the whole pipeline for this window: fold all reads into the graph, then generate
    /// the outputs enabled in the configuration. The outcome is recorded as the window status.
    fn process(&mut self, worker: &mut Worker, config: &BatchConfig) {
        let result = self.build_graph(&mut worker.aligner, config)
            .and_then(|_| self.generate_outputs(worker, config));

        self.status = match result {
            Ok(()) => StatusType::Success,
            Err(status) => {
                self.consensus.clear();
                self.msa_rows = 0;

                status
            }
        };
    }

    fn build_graph(&mut self, aligner: &mut PoaAligner, config: &BatchConfig) -> Result<(), StatusType> {
        for i in 0..self.num_reads() {
            let read = &self.reads[self.read_bounds[i]..self.read_bounds[i + 1]];

            let alignment: &[AlignedPair] = if self.graph.is_empty() {
                if read.len() > self.graph.max_nodes() {
                    return Err(StatusType::SeqLenExceededMaximumNodesPerWindow);
                }

                debug!(read = i, len = read.len(), "Creating initial graph");
                aligner.align_to_empty_graph(read.len())
            } else if read.is_empty() {
                &[]
            } else {
                let score = aligner.align(&self.graph, read, config.loop_count_upper_bound)?;
                debug!(read = i, len = read.len(), score, "Aligned read to graph");

                if tracing::enabled!(Level::TRACE) {
                    trace!("\n{}", print_alignment(&self.graph, read, aligner.alignment()));
                }

                aligner.alignment()
            };

            self.graph.add_alignment(read, alignment, &mut self.path_buf)?;
            self.paths.extend_from_slice(&self.path_buf);
            self.path_bounds.push(self.paths.len());
        }

        Ok(())
    }

    fn generate_outputs(&mut self, worker: &mut Worker, config: &BatchConfig) -> Result<(), StatusType> {
        let paths = self.path_bounds.windows(2)
            .map(|bounds| &self.paths[bounds[0]..bounds[1]]);

        if config.output_mode.has_consensus() {
            heaviest_path_consensus(
                &self.graph,
                paths.clone(),
                config.loop_count_upper_bound,
                &mut worker.consensus_buffers,
                &mut self.consensus,
            )?;
        }

        if config.output_mode.has_msa() {
            self.msa_rows = generate_msa(&self.graph, paths, &mut worker.msa_buffers, &mut self.msa)?;
        }

        Ok(())
    }
}

/// A batch of independent windows, processed in parallel.
///
/// Windows (graphs, read and output storage) and per-worker state (score matrices, alignment
/// and output scratch space) are allocated when the batch is created, sized by the
/// configured limits, and are reused after [`Batch::reset`].
pub struct Batch {
    config: BatchConfig,
    windows: Vec<Window>,
    num_windows: usize,
    workers: Vec<Worker>,
    state: BatchState,
}

impl Batch {
    pub fn new(config: BatchConfig) -> Result<Self, PoaBatchError> {
        config.validate()?;

        let windows = (0..config.max_poas_per_batch)
            .map(|_| Window::new(&config))
            .collect();

        let num_workers = config.num_threads.min(config.max_poas_per_batch);
        let workers = (0..num_workers)
            .map(|_| Worker::new(&config))
            .collect();

        debug!(
            max_poas = config.max_poas_per_batch,
            max_nodes = config.max_nodes_per_window,
            num_workers,
            "Allocated batch"
        );

        Ok(Batch {
            config,
            windows,
            num_windows: 0,
            workers,
            state: BatchState::Open,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Register a new window and add all given reads to it.
    ///
    /// If any read is rejected, the window is discarded again and the status of the
    /// rejected read is returned.
    pub fn add_window<S: AsRef<[u8]>>(&mut self, reads: &[S]) -> Result<WindowId, StatusType> {
        let id = self.add_poa()?;

        for read in reads {
            if let Err(status) = self.add_sequence(id, read.as_ref()) {
                self.windows[id].clear();
                self.num_windows -= 1;

                return Err(status);
            }
        }

        Ok(id)
    }

    /// Register a new, empty window. Reads are added with [`Batch::add_sequence`].
    pub fn add_poa(&mut self) -> Result<WindowId, StatusType> {
        if self.state != BatchState::Open {
            return Err(StatusType::GenericError);
        }

        if self.num_windows >= self.config.max_poas_per_batch {
            return Err(StatusType::ExceededBatchSize);
        }

        let id = self.num_windows;
        self.num_windows += 1;

        Ok(id)
    }

    pub fn add_sequence(&mut self, window: WindowId, read: &[u8]) -> Result<(), StatusType> {
        if self.state != BatchState::Open {
            return Err(StatusType::GenericError);
        }

        if window >= self.num_windows {
            return Err(StatusType::ExceededMaximumPoas);
        }

        if read.len() > self.config.max_sequence_size {
            return Err(StatusType::ExceededMaximumSequenceSize);
        }

        let window = &mut self.windows[window];
        if window.num_reads() >= self.config.max_sequences_per_poa {
            return Err(StatusType::ExceededMaximumSequencesPerPoa);
        }

        window.push_read(read);

        Ok(())
    }

    /// Process all registered windows, and return the status of each window.
    ///
    /// Windows are distributed over the worker threads; a failing window does not affect
    /// any other window. Returns an error only if the batch was already processed.
    pub fn process(&mut self) -> Result<Vec<StatusType>, StatusType> {
        if self.state != BatchState::Open {
            return Err(StatusType::GenericError);
        }

        let span = info_span!("process", windows = self.num_windows);
        let _enter = span.enter();

        let Batch { config, windows, num_windows, workers, .. } = self;
        let config = &*config;
        let windows = &mut windows[..*num_windows];

        let (tx, rx) = crossbeam_channel::bounded::<(WindowId, &mut Window)>(workers.len());

        thread::scope(|scope| {
            for worker in workers.iter_mut() {
                let thread_rx = rx.clone();
                let parent = span.clone();

                scope.spawn(move || {
                    while let Ok((id, window)) = thread_rx.recv() {
                        let window_span = debug_span!(parent: &parent, "window", id, reads = window.num_reads());
                        let _enter_window = window_span.enter();

                        window.process(worker, config);

                        if window.status.is_success() {
                            debug!(nodes = window.graph.node_count(), edges = window.graph.edge_count(), "Window done");
                        } else {
                            warn!(status = %window.status, "Window failed");
                        }
                    }
                });
            }

            drop(rx);

            for item in windows.iter_mut().enumerate() {
                if tx.send(item).is_err() {
                    break;
                }
            }

            drop(tx);
        });

        self.state = BatchState::Processed;

        let statuses: Vec<StatusType> = self.windows[..self.num_windows].iter()
            .map(|w| w.status)
            .collect();

        let num_failed = statuses.iter().filter(|s| !s.is_success()).count();
        info!(num_failed, "Processed batch");

        Ok(statuses)
    }

    /// Clear all windows and reopen the batch, keeping all allocated storage
    pub fn reset(&mut self) {
        for window in &mut self.windows[..self.num_windows] {
            window.clear();
        }

        self.num_windows = 0;
        self.state = BatchState::Open;
    }

    pub fn window_count(&self) -> usize {
        self.num_windows
    }

    pub fn is_processed(&self) -> bool {
        self.state == BatchState::Processed
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows[..self.num_windows].get(id)
    }

    pub fn window_status(&self, id: WindowId) -> Option<StatusType> {
        self.window(id).map(|w| w.status)
    }

    pub fn graph(&self, id: WindowId) -> Option<&POAGraph> {
        self.window(id).map(|w| &w.graph)
    }

    pub fn consensus(&self, id: WindowId) -> Result<&[u8], StatusType> {
        if !self.config.output_mode.has_consensus() {
            return Err(StatusType::OutputTypeUnavailable);
        }

        Ok(&self.processed_window(id)?.consensus)
    }

    /// MSA rows of a window, one per read, all of equal length
    pub fn msa(&self, id: WindowId) -> Result<&[Vec<u8>], StatusType> {
        if !self.config.output_mode.has_msa() {
            return Err(StatusType::OutputTypeUnavailable);
        }

        let window = self.processed_window(id)?;
        Ok(&window.msa[..window.msa_rows])
    }

    fn processed_window(&self, id: WindowId) -> Result<&Window, StatusType> {
        if self.state != BatchState::Processed {
            return Err(StatusType::GenericError);
        }

        let window = self.window(id).ok_or(StatusType::ExceededMaximumPoas)?;
        if !window.status.is_success() {
            return Err(window.status);
        }

        Ok(window)
    }
}

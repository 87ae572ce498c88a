//! In-memory collaborators for host tests
//!
//! - [`MockPageDir`]: user pages backed by individually boxed host pages,
//!   so neighbouring user pages are never contiguous in kernel memory
//! - [`MemFs`]: fixed-size files, handles stay usable after `remove`
//! - [`RecordingConsole`] / [`ScriptedKeyboard`]
//! - [`MockLifecycle`]: parent/child bookkeeping without real threads
//! - [`LockWatch`]: filesystem-lock holder counts seen by collaborators
//! - [`Harness`]: one process with code, data and stack pages mapped

use std::collections::{BTreeMap, VecDeque};
use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::vec::Vec;

use spin::{Mutex, Once};

use crate::drivers::{Console, Keyboard};
use crate::fs::FileSystem;
use crate::mm::{KernelAddr, PageDirectory, PageFlags, PageMapping, VirtAddr, PAGE_SIZE};
use crate::process::{ChildProcess, Pid, ProcessLifecycle, UserProcess};
use crate::syscall::{Syscalls, Termination};
use crate::trap::{Outcome, TrapFrame};

type Page = [u8; PAGE_SIZE];

/// Page directory with host-allocated frames.
pub struct MockPageDir {
    pages: BTreeMap<usize, (*mut u8, PageFlags)>,
}

impl MockPageDir {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Map a zeroed frame at `upage`, or change the flags of an existing one.
    pub fn map(&mut self, upage: VirtAddr, flags: PageFlags) -> KernelAddr {
        assert_eq!(upage.page_offset(), 0, "unaligned upage {:?}", upage);
        let entry = self
            .pages
            .entry(upage.as_usize())
            .or_insert_with(|| (Box::into_raw(Box::new([0u8; PAGE_SIZE])) as *mut u8, flags));
        entry.1 = flags;
        KernelAddr::from_ptr(entry.0)
    }

    pub fn unmap(&mut self, upage: VirtAddr) {
        if let Some((frame, _)) = self.pages.remove(&upage.as_usize()) {
            // SAFETY: `frame` came from Box::into_raw in `map`.
            drop(unsafe { Box::from_raw(frame as *mut Page) });
        }
    }

    fn byte_ptr(&self, addr: VirtAddr) -> *mut u8 {
        let (frame, _) = self
            .pages
            .get(&addr.align_down().as_usize())
            .unwrap_or_else(|| panic!("test wrote to unmapped {:?}", addr));
        // SAFETY: offset stays inside the frame.
        unsafe { frame.add(addr.page_offset()) }
    }

    /// Store bytes into user memory, ignoring page protections.
    pub fn write(&self, addr: VirtAddr, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let at = VirtAddr::new(addr.as_usize() + i);
            // SAFETY: byte_ptr points into a live frame owned by self.
            unsafe { self.byte_ptr(at).write(*byte) };
        }
    }

    pub fn write_words(&self, addr: VirtAddr, words: &[u32]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write(addr, &bytes);
    }

    pub fn read(&self, addr: VirtAddr, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                let at = VirtAddr::new(addr.as_usize() + i);
                // SAFETY: byte_ptr points into a live frame owned by self.
                unsafe { self.byte_ptr(at).read() }
            })
            .collect()
    }
}

impl Drop for MockPageDir {
    fn drop(&mut self) {
        let upages: Vec<usize> = self.pages.keys().copied().collect();
        for upage in upages {
            self.unmap(VirtAddr::new(upage));
        }
    }
}

// SAFETY: frames stay allocated until unmapped or the directory is dropped.
unsafe impl PageDirectory for MockPageDir {
    fn lookup(&self, upage: VirtAddr) -> Option<PageMapping> {
        self.pages
            .get(&upage.as_usize())
            .map(|&(frame, flags)| PageMapping {
                frame: KernelAddr::from_ptr(frame),
                flags,
            })
    }
}

/// An open in-memory file.
pub struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: usize,
}

/// Flat in-memory filesystem with fixed-size files.
#[derive(Default)]
pub struct MemFs {
    files: BTreeMap<String, Arc<Mutex<Vec<u8>>>>,
    open: usize,
    closed: usize,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, contents: &[u8]) -> Self {
        self.files
            .insert(name.into(), Arc::new(Mutex::new(contents.to_vec())));
        self
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).map(|data| data.lock().clone())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open
    }

    pub fn closed(&self) -> usize {
        self.closed
    }
}

impl FileSystem for MemFs {
    type Handle = MemFile;

    fn create(&mut self, path: &str, initial_size: u32) -> bool {
        if path.is_empty() || self.files.contains_key(path) {
            return false;
        }
        self.files.insert(
            path.into(),
            Arc::new(Mutex::new(vec![0u8; initial_size as usize])),
        );
        true
    }

    fn remove(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    fn open(&mut self, path: &str) -> Option<MemFile> {
        let data = Arc::clone(self.files.get(path)?);
        self.open += 1;
        Some(MemFile { data, pos: 0 })
    }

    fn read(&mut self, file: &mut MemFile, buf: &mut [u8]) -> usize {
        let data = file.data.lock();
        let start = file.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n;
        n
    }

    fn write(&mut self, file: &mut MemFile, buf: &[u8]) -> usize {
        let mut data = file.data.lock();
        let start = file.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        file.pos += n;
        n
    }

    fn seek(&mut self, file: &mut MemFile, position: u32) {
        file.pos = position as usize;
    }

    fn tell(&mut self, file: &MemFile) -> u32 {
        file.pos as u32
    }

    fn length(&mut self, file: &MemFile) -> u32 {
        file.data.lock().len() as u32
    }

    fn close(&mut self, file: MemFile) {
        self.open -= 1;
        self.closed += 1;
        drop(file);
    }
}

/// Records how many threads hold the filesystem lock whenever a
/// collaborator is called back.
pub struct LockWatch {
    syscalls: Once<Weak<TestSyscalls>>,
    samples: Mutex<Vec<(&'static str, usize)>>,
}

impl LockWatch {
    pub fn new() -> Self {
        Self {
            syscalls: Once::new(),
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Watch the lock of `syscalls`. Only the first call binds.
    pub fn bind(&self, syscalls: &Arc<TestSyscalls>) {
        self.syscalls.call_once(|| Arc::downgrade(syscalls));
    }

    fn record(&self, point: &'static str) {
        if let Some(syscalls) = self.syscalls.get().and_then(Weak::upgrade) {
            let holders = syscalls.fs_lock().holders();
            self.samples.lock().push((point, holders));
        }
    }

    /// `(callback, holders)` in call order.
    pub fn samples(&self) -> Vec<(&'static str, usize)> {
        self.samples.lock().clone()
    }

    /// Samples taken at `point` only.
    pub fn at(&self, point: &str) -> Vec<usize> {
        self.samples
            .lock()
            .iter()
            .filter(|(at, _)| *at == point)
            .map(|&(_, holders)| holders)
            .collect()
    }
}

/// Console that remembers every write call separately.
pub struct RecordingConsole {
    writes: Mutex<Vec<Vec<u8>>>,
    watch: Arc<LockWatch>,
}

impl RecordingConsole {
    pub fn new(watch: Arc<LockWatch>) -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            watch,
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn output(&self) -> Vec<u8> {
        self.writes.lock().concat()
    }
}

impl Console for RecordingConsole {
    fn write_bytes(&self, buf: &[u8]) {
        self.watch.record("console");
        self.writes.lock().push(buf.to_vec());
    }
}

/// Keyboard replaying a fixed sequence of keys, then NULs.
pub struct ScriptedKeyboard {
    keys: Mutex<VecDeque<u8>>,
    reads: AtomicUsize,
}

impl ScriptedKeyboard {
    pub fn new(keys: &[u8]) -> Self {
        Self {
            keys: Mutex::new(keys.iter().copied().collect()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `read_char` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Keyboard for ScriptedKeyboard {
    fn read_char(&self) -> u8 {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().pop_front().unwrap_or(0)
    }
}

struct ChildRecord {
    parent: Pid,
    loaded: bool,
    exit_status: Option<i32>,
    waited: bool,
}

struct LifecycleState {
    next_pid: i32,
    children: BTreeMap<Pid, ChildRecord>,
    exits: Vec<(Pid, i32)>,
}

/// Lifecycle collaborator knowing a fixed set of loadable programs.
pub struct MockLifecycle {
    programs: Vec<String>,
    state: Mutex<LifecycleState>,
    powered_off: AtomicBool,
    watch: Arc<LockWatch>,
}

/// Child handle returned by [`MockLifecycle::get_child`].
pub struct MockChild {
    loaded: bool,
    watch: Arc<LockWatch>,
}

impl ChildProcess for MockChild {
    fn wait_loaded(&self) -> bool {
        self.watch.record("wait_loaded");
        self.loaded
    }
}

impl MockLifecycle {
    pub fn new(programs: &[&str], watch: Arc<LockWatch>) -> Self {
        Self {
            programs: programs.iter().map(|p| String::from(*p)).collect(),
            state: Mutex::new(LifecycleState {
                next_pid: 2,
                children: BTreeMap::new(),
                exits: Vec::new(),
            }),
            powered_off: AtomicBool::new(false),
            watch,
        }
    }

    /// Lock observations shared with the console.
    pub fn watch(&self) -> &LockWatch {
        &self.watch
    }

    /// `(pid, status)` of every process torn down so far.
    pub fn exits(&self) -> Vec<(Pid, i32)> {
        self.state.lock().exits.clone()
    }

    /// Loaded and not yet exited.
    pub fn is_runnable(&self, pid: Pid) -> bool {
        self.state
            .lock()
            .children
            .get(&pid)
            .is_some_and(|child| child.loaded && child.exit_status.is_none())
    }

    pub fn powered_off(&self) -> bool {
        self.powered_off.load(Ordering::SeqCst)
    }
}

impl ProcessLifecycle for MockLifecycle {
    type Child = MockChild;

    fn create_process(&self, parent: Pid, cmd_line: &str) -> Option<Pid> {
        self.watch.record("create_process");
        let program = cmd_line.split_whitespace().next()?;
        let loaded = self.programs.iter().any(|p| p == program);

        let mut state = self.state.lock();
        let pid = Pid::new(state.next_pid);
        state.next_pid += 1;
        state.children.insert(
            pid,
            ChildRecord {
                parent,
                loaded,
                // A child that fails to load exits on its own.
                exit_status: if loaded { None } else { Some(-1) },
                waited: false,
            },
        );
        Some(pid)
    }

    fn get_child(&self, parent: Pid, pid: Pid) -> Option<MockChild> {
        let state = self.state.lock();
        let child = state.children.get(&pid)?;
        (child.parent == parent && !child.waited).then(|| MockChild {
            loaded: child.loaded,
            watch: Arc::clone(&self.watch),
        })
    }

    fn join(&self, parent: Pid, pid: Pid) -> i32 {
        self.watch.record("join");
        let mut state = self.state.lock();
        match state.children.get_mut(&pid) {
            Some(child) if child.parent == parent && !child.waited => {
                child.waited = true;
                child
                    .exit_status
                    .expect("join would block: child still running")
            }
            _ => -1,
        }
    }

    fn exit(&self, pid: Pid, status: i32) {
        let mut state = self.state.lock();
        state.exits.push((pid, status));
        if let Some(child) = state.children.get_mut(&pid) {
            child.exit_status = Some(status);
        }
    }

    fn power_off(&self) {
        self.powered_off.store(true, Ordering::SeqCst);
    }
}

pub type TestSyscalls = Syscalls<MemFs, MockLifecycle, RecordingConsole, ScriptedKeyboard>;
pub type TestProcess = UserProcess<MemFile, MockPageDir>;

/// Read-only program image page.
pub const CODE_PAGE: usize = 0x0804_8000;
/// First of two writable data pages.
pub const DATA_PAGE: usize = 0x0804_9000;
/// Never mapped.
pub const UNMAPPED_PAGE: usize = 0x1000_0000;
/// Top user stack page.
pub const STACK_PAGE: usize = 0xbfff_f000;
/// Stack pointer used for every trap.
pub const STACK_POINTER: usize = 0xbfff_fe00;

pub fn test_syscalls(fs: MemFs, programs: &[&str], keys: &[u8]) -> TestSyscalls {
    let watch = Arc::new(LockWatch::new());
    Syscalls::new(
        fs,
        MockLifecycle::new(programs, Arc::clone(&watch)),
        RecordingConsole::new(watch),
        ScriptedKeyboard::new(keys),
    )
}

/// A process attached to a (possibly shared) system-call layer.
pub struct Harness {
    pub syscalls: Arc<TestSyscalls>,
    pub process: TestProcess,
    cursor: usize,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(MemFs::new(), &["child"], b"")
    }

    pub fn build(fs: MemFs, programs: &[&str], keys: &[u8]) -> Self {
        Self::attach(Arc::new(test_syscalls(fs, programs, keys)), Pid::new(1), "test")
    }

    pub fn attach(syscalls: Arc<TestSyscalls>, pid: Pid, name: &str) -> Self {
        syscalls.lifecycle().watch().bind(&syscalls);
        let mut pagedir = MockPageDir::new();
        pagedir.map(VirtAddr::new(CODE_PAGE), PageFlags::USER_CODE);
        pagedir.map(VirtAddr::new(DATA_PAGE), PageFlags::USER_DATA);
        pagedir.map(VirtAddr::new(DATA_PAGE + PAGE_SIZE), PageFlags::USER_DATA);
        pagedir.map(VirtAddr::new(STACK_PAGE), PageFlags::USER_DATA);
        Self {
            syscalls,
            process: UserProcess::new(pid, name, pagedir),
            cursor: DATA_PAGE,
        }
    }

    /// Push `number` and `args` at the stack pointer and build the frame.
    pub fn frame(&mut self, number: u32, args: &[u32]) -> TrapFrame {
        let mut words = vec![number];
        words.extend_from_slice(args);
        self.process
            .pagedir
            .write_words(VirtAddr::new(STACK_POINTER), &words);
        TrapFrame::syscall(STACK_POINTER as u32)
    }

    pub fn dispatch(&mut self, number: u32, args: &[u32]) -> Result<(), Termination> {
        let mut frame = self.frame(number, args);
        self.syscalls.dispatch(&mut self.process, &mut frame)
    }

    /// Run a call that must return normally; yields the return slot.
    pub fn call(&mut self, number: u32, args: &[u32]) -> u32 {
        let mut frame = self.frame(number, args);
        self.syscalls
            .dispatch(&mut self.process, &mut frame)
            .unwrap_or_else(|t| panic!("syscall {} terminated: {:?}", number, t));
        frame.eax
    }

    /// Full trap path including teardown.
    pub fn trap(&mut self, number: u32, args: &[u32]) -> Outcome {
        let mut frame = self.frame(number, args);
        self.syscalls.handle_trap(&mut self.process, &mut frame)
    }

    /// Reserve `len` zeroed bytes in the data pages.
    pub fn alloc(&mut self, len: usize) -> u32 {
        let addr = self.cursor;
        assert!(addr + len <= DATA_PAGE + 2 * PAGE_SIZE, "data pages exhausted");
        self.cursor += len;
        addr as u32
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> u32 {
        let addr = self.alloc(bytes.len());
        self.process.pagedir.write(VirtAddr::new(addr as usize), bytes);
        addr
    }

    /// Place a NUL-terminated copy of `s` in the data pages.
    pub fn put_str(&mut self, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.put_bytes(&bytes)
    }

    pub fn read_user(&self, addr: u32, len: usize) -> Vec<u8> {
        self.process.pagedir.read(VirtAddr::new(addr as usize), len)
    }

    pub fn unmapped_addr(&self) -> u32 {
        UNMAPPED_PAGE as u32
    }

    pub fn code_addr(&self) -> u32 {
        CODE_PAGE as u32
    }

    pub fn console_output(&self) -> Vec<u8> {
        self.syscalls.console().output()
    }

    /// Run `f` with the filesystem locked.
    pub fn with_fs<R>(&self, f: impl FnOnce(&mut MemFs) -> R) -> R {
        let mut fs = self.syscalls.fs_lock().lock();
        f(&mut *fs)
    }
}

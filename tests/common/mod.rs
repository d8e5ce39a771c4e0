#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;

use anyhow::Error;
use tempfile::TempDir;

use ioccc_check::{CheckReport, Checker, Diagnostic, Unpacked};
use ioccc_remote::mock::MockTransport;
use ioccc_remote::{RemoteOutput, ServerLayout, SubmitServer};
use ioccc_slot::{Sha256Digest, SlotId, SlotInfo, SubmitFilename};
use ioccc_store::CollectStore;
use ioccc_submit_tool::{CollectOptions, Collector};

pub fn setup() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_nanos()
        .is_test(true)
        .try_init();
}

/// A checker that accepts everything, unless told otherwise.
#[derive(Debug, Default)]
pub struct FakeChecker {
    pub tarball_errors: RefCell<Vec<String>>,
    pub entry_errors: RefCell<Vec<String>>,
    pub checked: RefCell<Vec<String>>,
}

impl FakeChecker {
    pub fn fail_tarball(&self, message: &str) {
        self.tarball_errors.borrow_mut().push(message.into());
    }

    pub fn fail_entry(&self, message: &str) {
        self.entry_errors.borrow_mut().push(message.into());
    }

    fn report(errors: &[String]) -> CheckReport {
        let mut report = CheckReport::new();
        for error in errors {
            report.add_diagnostic(Diagnostic::error(error.clone()));
        }
        report
    }
}

impl Checker for FakeChecker {
    fn check_tarball(&self, tarball: &Path) -> Result<CheckReport, Error> {
        self.checked
            .borrow_mut()
            .push(tarball.file_name().unwrap().to_string_lossy().into());
        Ok(Self::report(&self.tarball_errors.borrow()))
    }

    fn unpack(&self, tarball: &Path, dest: &Path) -> Result<Unpacked, Error> {
        let entry = dest.join("entry");
        std::fs::create_dir_all(&entry)?;
        std::fs::copy(tarball, entry.join("prog.c"))?;
        std::fs::write(entry.join("remarks.md"), "# Remarks\n")?;
        Ok(Unpacked::Dir(entry))
    }

    fn check_entry(&self, dir: &Path) -> Result<CheckReport, Error> {
        assert!(dir.join("remarks.md").exists());
        Ok(Self::report(&self.entry_errors.borrow()))
    }
}

/// A local collect tree and a fake submit server.
pub struct TestEnv {
    pub store: CollectStore,
    pub transport: MockTransport,
    pub server: SubmitServer,
    pub checker: FakeChecker,
    tempdir: TempDir,
}

impl TestEnv {
    pub fn new() -> TestEnv {
        setup();
        let tempdir = TempDir::new().expect("Cannot create tempdir");
        let store = CollectStore::open(tempdir.path().join("collect")).unwrap();
        let transport = MockTransport::new();
        let server = SubmitServer::new(transport.clone(), ServerLayout::default());
        TestEnv {
            store,
            transport,
            server,
            checker: FakeChecker::default(),
            tempdir,
        }
    }

    /// A scratch directory outside of the collect tree.
    pub fn scratch(&self) -> &Path {
        self.tempdir.path()
    }

    pub fn collector(&self, options: CollectOptions) -> Collector<'_> {
        Collector::new(&self.server, &self.store, &self.checker, options)
    }

    /// Simulate an upload of `content` in the slot: the slot JSON describes it and `stage.py`
    /// stages it.
    pub fn upload(&self, id: &SlotId, timestamp: u64, content: &[u8]) -> SubmitFilename {
        let file = SubmitFilename::new(id.clone(), timestamp).unwrap();
        let digest = Sha256Digest::from_content(content);
        self.set_slot(&uploaded(&file, content));
        self.transport
            .respond_always("stage.py", RemoteOutput::ok(format!("{} 0\n", digest)));
        self.transport
            .add_file(&self.server.layout().staged(&file), content);
        file
    }

    /// The content of `cat slot.json` from now on.
    pub fn set_slot(&self, info: &SlotInfo) {
        self.transport.respond_always(
            "cat",
            RemoteOutput::ok(serde_json::to_string_pretty(info).unwrap()),
        );
    }

    /// The status updates sent to the server, as (status, collected).
    pub fn statuses(&self) -> Vec<(String, bool)> {
        self.transport
            .commands_of("set_slot_status.py")
            .into_iter()
            .map(|c| {
                let collected = c.iter().any(|a| a == "-c");
                (c.last().unwrap().clone(), collected)
            })
            .collect()
    }

    pub fn staged_exists(&self, file: &SubmitFilename) -> bool {
        self.transport.has_file(&self.server.layout().staged(file))
    }
}

/// The slot JSON right after the upload of `content` as `file`.
pub fn uploaded(file: &SubmitFilename, content: &[u8]) -> SlotInfo {
    SlotInfo {
        filename: Some(file.to_string()),
        length: Some(content.len() as i64),
        date: Some("2025-02-01 10:20:30.123456 UTC".into()),
        sha256: Some(Sha256Digest::from_content(content).to_string()),
        status: "submit file received".into(),
        ..SlotInfo::empty(file.id().slot)
    }
}

pub fn default_options() -> CollectOptions {
    CollectOptions {
        collected_by: "judge@test".into(),
        ..Default::default()
    }
}

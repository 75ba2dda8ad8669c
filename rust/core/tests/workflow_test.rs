// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use visor_ifc_core::{
    AppState, Command, ElementHandle, Error, LogConfig, LogKind, LogStore, MemoryStore, ModelHandle,
    ModelSource, Outcome, PickedElement, PrivateLogFile, RecordStatus, SpatialNode, TreeView,
    Viewer, ViewerError,
};

/// Scripted viewer: the pointer is the express id under the cursor.
#[derive(Default)]
struct FakeViewer {
    next_model: AtomicU32,
    guids: HashMap<u32, &'static str>,
    geometry_ready: AtomicBool,
    fail_unload: AtomicBool,
    init_calls: AtomicUsize,
    release_slow_load: Notify,
    hold_unload: AtomicBool,
    release_unload: Notify,
    /// Element 104 resolves its GlobalId only once released.
    resolving: AtomicBool,
    release_resolve: Notify,
    loaded: Mutex<Vec<ModelHandle>>,
    unloaded: Mutex<Vec<ModelHandle>>,
    highlights: Mutex<Vec<(ElementHandle, bool)>>,
}

impl FakeViewer {
    fn new() -> Self {
        let guids = HashMap::from([
            (101, "2O2Fr$t4X7Zf8NOew3FLOH"),
            (102, "1hOSvn6df7F8_7GcBWlRrM"),
            (103, ""),
            (104, "3cUkl32yn9qRSPvBJVyWYp"),
        ]);
        Self {
            guids,
            geometry_ready: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn current(&self) -> Option<ModelHandle> {
        self.loaded.lock().unwrap().last().copied()
    }
}

impl Viewer for FakeViewer {
    type Pointer = Option<u32>;

    async fn initialize(&self) -> Result<(), ViewerError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, source: &ModelSource) -> Result<ModelHandle, ViewerError> {
        let name = source.display_name();
        if name.contains("slow") {
            self.release_slow_load.notified().await;
        }
        if name.contains("broken") {
            return Err(ViewerError::Decode("unexpected end of file".into()));
        }
        let model = ModelHandle(self.next_model.fetch_add(1, Ordering::SeqCst) + 1);
        self.loaded.lock().unwrap().push(model);
        Ok(model)
    }

    async fn unload(&self, model: ModelHandle) -> Result<(), ViewerError> {
        self.unloaded.lock().unwrap().push(model);
        if self.hold_unload.load(Ordering::SeqCst) {
            self.release_unload.notified().await;
        }
        if self.fail_unload.load(Ordering::SeqCst) {
            return Err(ViewerError::UnknownModel(model));
        }
        Ok(())
    }

    async fn pick_element(&self, pointer: &Option<u32>) -> Result<Option<PickedElement>, ViewerError> {
        Ok(pointer.and_then(|id| {
            self.current().map(|model| PickedElement {
                model,
                element: ElementHandle(id),
            })
        }))
    }

    async fn stable_id(
        &self,
        model: ModelHandle,
        element: ElementHandle,
    ) -> Result<Option<String>, ViewerError> {
        if element.0 == 104 {
            self.resolving.store(true, Ordering::SeqCst);
            self.release_resolve.notified().await;
        }
        match self.guids.get(&element.0) {
            Some(guid) => Ok(Some(guid.to_string())),
            None => Err(ViewerError::UnknownElement { model, element }),
        }
    }

    async fn highlight(
        &self,
        _model: ModelHandle,
        element: ElementHandle,
        focus: bool,
    ) -> Result<(), ViewerError> {
        self.highlights.lock().unwrap().push((element, focus));
        Ok(())
    }

    fn has_renderable_geometry(&self, _model: ModelHandle) -> bool {
        self.geometry_ready.load(Ordering::SeqCst)
    }

    async fn spatial_hierarchy(&self, model: ModelHandle) -> Result<SpatialNode, ViewerError> {
        let node = |id: u32, name: &str, ty: &str, children| SpatialNode {
            model,
            element: ElementHandle(id),
            name: Some(name.to_string()),
            ifc_type: Some(ty.to_string()),
            children,
        };
        Ok(node(
            1,
            "Project",
            "IFCPROJECT",
            vec![node(
                2,
                "Level 0",
                "IFCBUILDINGSTOREY",
                vec![
                    node(101, "Wall North", "IFCWALL", vec![]),
                    node(102, "Slab", "IFCSLAB", vec![]),
                ],
            )],
        ))
    }
}

fn app() -> AppState<FakeViewer> {
    AppState::new(
        FakeViewer::new(),
        &LogConfig::default(),
        Some(Arc::new(MemoryStore::new())),
        PrivateLogFile::unavailable(),
    )
}

fn url(name: &str) -> ModelSource {
    ModelSource::Url(format!("https://models.example.com/{name}"))
}

fn last_message(log: &LogStore) -> String {
    log.visible().last().map(|e| e.message.clone()).unwrap_or_default()
}

async fn pick_and_register(app: &AppState<FakeViewer>, id: u32, comment: &str) {
    app.dispatch(Command::PickFromScene(Some(id))).await;
    app.dispatch(Command::SetComment(comment.into())).await;
    app.dispatch(Command::Register).await;
}

#[tokio::test]
async fn test_load_pick_register_export() {
    let app = app();
    assert_eq!(app.dispatch(Command::OpenModel(url("house.ifc"))).await, Outcome::Loaded(true));
    assert!(app.status().loaded);

    app.dispatch(Command::PickFromScene(Some(101))).await;
    assert_eq!(last_message(&app.log), "Element 2O2Fr$t4X7Zf8NOew3FLOH ready to register.");
    assert!(!app.form().date.is_empty());

    app.dispatch(Command::SetDate("2024-05-14".into())).await;
    app.dispatch(Command::SetStatus(RecordStatus::Pending)).await;
    app.dispatch(Command::SetComment(r#"He said "ok", done"#.into())).await;
    let outcome = app.dispatch(Command::Register).await;
    let Outcome::Registered(record) = outcome else {
        panic!("expected a record, got {outcome:?}");
    };
    assert_eq!(record.element_id, "2O2Fr$t4X7Zf8NOew3FLOH");
    assert!(app.pending().is_none());
    assert!(app.form().comment.is_empty());
    assert_eq!(last_message(&app.log), "Record saved for 2O2Fr$t4X7Zf8NOew3FLOH.");

    let Outcome::Artifact(csv) = app.dispatch(Command::ExportCsv).await else {
        panic!("expected CSV artifact");
    };
    assert!(csv.file_name.starts_with("registros-ifc-"));
    assert!(csv.file_name.ends_with(".csv"));
    assert_eq!(
        csv.body,
        "GUID,FECHA,ESTADO,COMENTARIO\n2O2Fr$t4X7Zf8NOew3FLOH,2024-05-14,PENDIENTE,\"He said \"\"ok\"\", done\""
    );
    assert_eq!(app.ledger.len(), 1);
}

#[tokio::test]
async fn test_reload_resets_records_and_selection() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    pick_and_register(&app, 101, "first").await;
    app.dispatch(Command::PickFromScene(Some(102))).await;
    assert_eq!(app.ledger.len(), 1);
    assert!(app.pending().is_some());

    assert_eq!(app.dispatch(Command::OpenModel(url("tower.ifc"))).await, Outcome::Loaded(true));
    assert!(app.ledger.is_empty());
    assert!(app.pending().is_none());
    assert_eq!(app.status().active_model, Some(ModelHandle(2)));
    assert_eq!(*app.viewer.unloaded.lock().unwrap(), vec![ModelHandle(1)]);
}

#[tokio::test]
async fn test_second_load_rejected_while_first_in_flight() {
    let app = Arc::new(app());
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;

    let first = tokio::spawn({
        let app = app.clone();
        async move { app.dispatch(Command::OpenModel(url("slow.ifc"))).await }
    });
    while !app.session.is_loading() {
        tokio::task::yield_now().await;
    }

    let active_before = app.status().active_model;
    let second = app.dispatch(Command::OpenModel(url("other.ifc"))).await;
    assert_eq!(second, Outcome::Loaded(false));
    assert_eq!(app.status().active_model, active_before);
    assert_eq!(last_message(&app.log), "An IFC model is already loading. Wait for it to finish.");

    let rejection = app.session.open(url("other.ifc")).await.unwrap_err();
    assert!(matches!(rejection.error, Error::LoadInProgress));
    assert_eq!(rejection.message, "An IFC model is already loading. Wait for it to finish.");

    app.viewer.release_slow_load.notify_one();
    assert_eq!(first.await.unwrap(), Outcome::Loaded(true));
    assert!(!app.session.is_loading());
    assert_eq!(app.status().active_model, Some(ModelHandle(2)));
    // Only the two accepted loads reached the viewer.
    assert_eq!(app.viewer.loaded.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_selection_ignored_while_loading() {
    let app = Arc::new(app());
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    let old_model = app.status().active_model.unwrap();
    app.viewer.hold_unload.store(true, Ordering::SeqCst);

    let load = tokio::spawn({
        let app = app.clone();
        async move { app.dispatch(Command::OpenModel(url("tower.ifc"))).await }
    });
    // The old model is still loaded while the viewer releases it.
    while app.viewer.unloaded.lock().unwrap().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(app.status().loaded);

    app.dispatch(Command::PickFromScene(Some(101))).await;
    app.dispatch(Command::SelectElement {
        model: old_model,
        element: ElementHandle(102),
        focus: false,
    })
    .await;
    app.dispatch(Command::FocusSelection(Some(101))).await;
    assert!(app.pending().is_none());
    assert!(app.viewer.highlights.lock().unwrap().is_empty());

    app.viewer.release_unload.notify_one();
    assert_eq!(load.await.unwrap(), Outcome::Loaded(true));
    assert_eq!(app.status().active_model, Some(ModelHandle(2)));
    assert!(app.pending().is_none());
    assert_eq!(app.dispatch(Command::Register).await, Outcome::Done);
    assert!(app.ledger.is_empty());
    assert_eq!(last_message(&app.log), "Select an element before registering.");
}

#[tokio::test]
async fn test_pick_resolved_after_reload_is_dropped() {
    let app = Arc::new(app());
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;

    let pick = tokio::spawn({
        let app = app.clone();
        async move { app.dispatch(Command::PickFromScene(Some(104))).await }
    });
    while !app.viewer.resolving.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }

    assert_eq!(app.dispatch(Command::OpenModel(url("tower.ifc"))).await, Outcome::Loaded(true));
    app.viewer.release_resolve.notify_one();
    pick.await.unwrap();

    assert!(app.pending().is_none());
    assert_eq!(app.dispatch(Command::Register).await, Outcome::Done);
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn test_tree_selection_of_replaced_model_is_refused() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    let old_model = app.status().active_model.unwrap();
    app.dispatch(Command::OpenModel(url("tower.ifc"))).await;

    app.dispatch(Command::SelectElement {
        model: old_model,
        element: ElementHandle(101),
        focus: false,
    })
    .await;
    assert!(app.pending().is_none());
    assert_eq!(last_message(&app.log), "Could not handle the element selection.");
}

#[tokio::test]
async fn test_failed_load_leaves_session_unloaded() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    pick_and_register(&app, 101, "").await;

    assert_eq!(app.dispatch(Command::OpenModel(url("broken.ifc"))).await, Outcome::Loaded(false));
    let status = app.status();
    assert!(!status.loaded);
    assert_eq!(status.active_model, None);
    assert!(!status.is_loading);
    assert!(app.ledger.is_empty());

    let last = app.log.visible().pop().unwrap();
    assert_eq!(last.kind, LogKind::Error);
    assert_eq!(last.message, "Could not load the IFC model. Check the file.");
    assert!(last.detail.unwrap().contains("unexpected end of file"));

    let rejection = app.session.open(url("broken.ifc")).await.unwrap_err();
    assert!(matches!(rejection.error, Error::Viewer(ViewerError::Decode(_))));
    assert_eq!(rejection.message, "Could not load the IFC model. Check the file.");

    // Picks are ignored until a model is loaded again.
    let before = app.log.history_len();
    app.dispatch(Command::PickFromScene(Some(101))).await;
    assert_eq!(app.log.history_len(), before);
    assert!(app.pending().is_none());
}

#[tokio::test]
async fn test_unload_failure_is_not_fatal() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    app.viewer.fail_unload.store(true, Ordering::SeqCst);

    assert_eq!(app.dispatch(Command::OpenModel(url("tower.ifc"))).await, Outcome::Loaded(true));
    assert_eq!(app.status().active_model, Some(ModelHandle(2)));
    assert!(app
        .log
        .history()
        .iter()
        .any(|line| line.contains("Could not fully unload the previous model.")));
}

#[tokio::test]
async fn test_engine_initialised_once() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    app.dispatch(Command::OpenModel(url("tower.ifc"))).await;
    assert_eq!(app.viewer.init_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_file_is_rejected() {
    let app = app();
    let empty = ModelSource::File {
        name: "empty.ifc".into(),
        bytes: Vec::new(),
    };
    assert_eq!(app.dispatch(Command::OpenModel(empty)).await, Outcome::Loaded(false));
    assert!(app.viewer.loaded.lock().unwrap().is_empty());
    assert_eq!(last_message(&app.log), "No IFC file was selected.");
}

#[tokio::test]
async fn test_pick_failures_are_reported() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;

    app.dispatch(Command::PickFromScene(None)).await;
    assert_eq!(last_message(&app.log), "No element detected in the selection.");

    app.dispatch(Command::PickFromScene(Some(103))).await;
    assert_eq!(last_message(&app.log), "The selected element has no GUID.");

    app.dispatch(Command::PickFromScene(Some(999))).await;
    assert_eq!(last_message(&app.log), "Could not handle the element selection.");

    app.viewer.geometry_ready.store(false, Ordering::SeqCst);
    app.dispatch(Command::PickFromScene(Some(101))).await;
    assert_eq!(last_message(&app.log), "Geometry is still being generated; wait a few seconds.");

    assert!(app.pending().is_none());
}

#[tokio::test]
async fn test_register_requires_selection_and_date() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;

    assert_eq!(app.dispatch(Command::Register).await, Outcome::Done);
    assert_eq!(last_message(&app.log), "Select an element before registering.");

    app.dispatch(Command::PickFromScene(Some(101))).await;
    app.dispatch(Command::SetDate(String::new())).await;
    assert_eq!(app.dispatch(Command::Register).await, Outcome::Done);
    assert_eq!(last_message(&app.log), "Choose a valid date to register.");
    assert!(app.ledger.is_empty());
    assert!(app.pending().is_some());
}

#[tokio::test]
async fn test_focus_selection() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;

    // Nothing pending: pick with focus, without the success entry.
    let before = app.log.history_len();
    app.dispatch(Command::FocusSelection(Some(102))).await;
    assert_eq!(app.log.history_len(), before);
    assert_eq!(app.pending().unwrap().element, ElementHandle(102));

    app.dispatch(Command::FocusSelection(Some(101))).await;
    assert_eq!(app.pending().unwrap().element, ElementHandle(102));
    assert_eq!(
        *app.viewer.highlights.lock().unwrap(),
        vec![(ElementHandle(102), true), (ElementHandle(102), true)]
    );
}

#[tokio::test]
async fn test_tree_select_and_filter() {
    let app = app();
    assert_eq!(
        app.dispatch(Command::FilterTree(String::new())).await,
        Outcome::Tree(TreeView::Unavailable)
    );
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;

    let Outcome::Tree(TreeView::Nodes(nodes)) = app.dispatch(Command::FilterTree("SLAB".into())).await
    else {
        panic!("expected matching nodes");
    };
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].children.len(), 1);
    assert_eq!(nodes[0].children[0].label(), "Slab (IFCSLAB)");

    assert_eq!(
        app.dispatch(Command::FilterTree("window".into())).await,
        Outcome::Tree(TreeView::NoMatches)
    );

    let model = app.status().active_model.unwrap();
    app.dispatch(Command::SelectElement {
        model,
        element: nodes[0].children[0].element,
        focus: true,
    })
    .await;
    assert_eq!(app.pending().unwrap().element_id, "1hOSvn6df7F8_7GcBWlRrM");
}

#[tokio::test]
async fn test_exports_and_log_filter() {
    let app = app();
    assert_eq!(app.dispatch(Command::ExportCsv).await, Outcome::Done);
    assert_eq!(last_message(&app.log), "There are no records to export.");

    let Outcome::Artifact(log) = app.dispatch(Command::ExportLog).await else {
        panic!("expected log artifact");
    };
    assert!(log.file_name.starts_with("visor-ifc-log-"));
    assert!(log.body.contains("[ERROR] There are no records to export."));

    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    let Outcome::Log(visible) = app.dispatch(Command::FilterLog("model ready".into())).await else {
        panic!("expected filtered log");
    };
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].message, "Model ready: house.ifc");
}

#[tokio::test]
async fn test_same_element_can_be_recorded_twice() {
    let app = app();
    app.dispatch(Command::OpenModel(url("house.ifc"))).await;
    pick_and_register(&app, 101, "formwork").await;
    pick_and_register(&app, 101, "poured").await;

    let records = app.ledger.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].element_id, records[1].element_id);
    assert_eq!(records[1].comment, "poured");
}

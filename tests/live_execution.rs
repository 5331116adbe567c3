use kestrel_sketch::config::AppConfig;
use kestrel_sketch::console::ConsoleKind;
use kestrel_sketch::events::StoreEvent;
use kestrel_sketch::headless::{
    BlankPixelEditor, ContentAddressedShare, DirectoryExporter, MemoryClipboard, RecordingScheduler,
    SummaryView, TextBuffer, TickingEngineFactory,
};
use kestrel_sketch::host::{Editor, MarkupKind};
use kestrel_sketch::lifecycle::{AnimationFrameId, DebugOverlay};
use kestrel_sketch::{Action, Dispatcher, Host};
use serde_json::json;
use tempfile::TempDir;

struct Rig {
    dispatcher: Dispatcher,
    editor: TextBuffer,
    view: SummaryView,
    engines: TickingEngineFactory,
    frames: RecordingScheduler,
    _dir: TempDir,
}

fn rig(config: AppConfig) -> Rig {
    let dir = tempfile::tempdir().expect("temp dir");
    let editor = TextBuffer::default();
    let view = SummaryView::default();
    let engines = TickingEngineFactory::default();
    let frames = RecordingScheduler::default();
    let host = Host {
        editor: Box::new(editor.clone()),
        pixel_editor: Box::new(BlankPixelEditor::new(config.sprite.canvas())),
        view: Box::new(view.clone()),
        engines: Box::new(engines.clone()),
        frames: Box::new(frames.clone()),
        share: Box::new(ContentAddressedShare::new(dir.path())),
        clipboard: Box::new(MemoryClipboard::default()),
        files: Box::new(DirectoryExporter::new(dir.path())),
    };
    Rig { dispatcher: Dispatcher::new(&config, host), editor, view, engines, frames, _dir: dir }
}

fn seeded() -> AppConfig {
    let mut config = AppConfig::default();
    config.sandbox.deterministic_seed = Some(11);
    config
}

impl Rig {
    fn run(&mut self, program: &str) {
        self.editor.replace_all(program);
        self.dispatcher.dispatch(Action::Run);
    }
}

#[test]
fn program_reads_state_and_sprites() {
    let mut rig = rig(seeded());
    rig.dispatcher.dispatch(Action::Init);
    rig.dispatcher.dispatch(Action::CanvasMouseMove { mouse_x: 4.0, mouse_y: 9.5 });
    let selected = rig.dispatcher.state().selected_sprite().to_string();

    rig.run(&format!(
        "print(_state.mouse_x);\nprint(_state.mouse_y);\nprint({selected}.colors.len());\nprint(_state.name);"
    ));
    let state = rig.dispatcher.state();
    assert!(!state.error());
    assert_eq!(state.logs().texts(), vec!["4.0", "9.5", "1024", "name-here"]);
}

#[test]
fn helper_functions_reach_sprites_state_and_muse() {
    let mut rig = rig(seeded());
    rig.dispatcher.dispatch(Action::Init);
    rig.dispatcher.dispatch(Action::CanvasMouseMove { mouse_x: 2.5, mouse_y: 0.0 });
    let selected = rig.dispatcher.state().selected_sprite().to_string();

    rig.run(&format!(
        "fn size() {{ {selected}.colors.len() }}\n\
         fn x() {{ _state.mouse_x }}\n\
         fn cue() {{ Muse.play(\"ping\"); 1 }}\n\
         print(size()); print(x()); print(cue());"
    ));
    let state = rig.dispatcher.state();
    assert!(!state.error(), "{:?}", state.logs().last());
    assert_eq!(state.logs().texts(), vec!["1024", "2.5", "1"]);
    assert_eq!(rig.dispatcher.sandbox().audio().recent_cues(), vec!["ping"]);
}

#[test]
fn failing_run_leaves_exactly_one_error_entry() {
    let mut rig = rig(seeded());
    rig.run("print(\"earlier\");");
    assert_eq!(rig.dispatcher.state().logs().texts(), vec!["earlier"]);
    rig.run("print(\"first\");\nthrow \"boom\";\nprint(\"never\");");

    let state = rig.dispatcher.state();
    assert!(state.error());
    let errors: Vec<_> = state.logs().entries().filter(|entry| entry.kind == ConsoleKind::Error).collect();
    assert_eq!(errors.len(), 1);
    let last = state.logs().last().expect("error entry");
    assert_eq!(last.kind, ConsoleKind::Error);
    let diagnostic: serde_json::Value = serde_json::from_str(&last.text).expect("diagnostic is JSON");
    assert_eq!(diagnostic["kind"], json!("RuntimeError"));
    assert_eq!(diagnostic["message"], json!("boom"));
    assert_eq!(diagnostic["line"], json!(2));
    assert_eq!(state.logs().len(), 2);
    assert_eq!(state.logs().texts()[0], "first");
    assert!(!state.logs().texts().contains(&"earlier"));
}

#[test]
fn next_good_run_clears_previous_failure() {
    let mut rig = rig(seeded());
    rig.run("let x = ;");
    assert!(rig.dispatcher.state().error());
    rig.run("print(\"ok\");");
    let state = rig.dispatcher.state();
    assert!(!state.error());
    assert_eq!(state.logs().texts(), vec!["ok"]);
}

#[test]
fn runaway_program_hits_operation_limit() {
    let mut config = seeded();
    config.sandbox.max_operations = 10_000;
    let mut rig = rig(config);
    rig.run("loop { }");
    let state = rig.dispatcher.state();
    assert!(state.error());
    assert!(state.logs().last().is_some_and(|entry| entry.text.contains("TooManyOperations")));
}

#[test]
fn creating_an_engine_cancels_the_previous_frame() {
    let mut rig = rig(seeded());
    rig.run("let e = createEngine(#{ width: 64 }); print(e.generation);");
    rig.run("let e = createEngine(); print(e.generation); print(e.animation_frame);");

    assert_eq!(rig.dispatcher.state().logs().texts(), vec!["2", "2"]);
    assert_eq!(rig.frames.cancelled(), vec![AnimationFrameId(1)]);
    let constructed = rig.engines.constructed();
    assert_eq!(constructed.len(), 2);
    assert_eq!(constructed[0], vec![json!({ "width": 64 })]);
    assert!(constructed[1].is_empty());

    let lifecycle = rig.dispatcher.state().engine().borrow();
    assert_eq!(lifecycle.generation(), 2);
    assert_eq!(lifecycle.cancelled_frames(), 1);
}

#[test]
fn overlay_follows_set_show() {
    let mut rig = rig(seeded());
    let show = DebugOverlay { origin: true, hitbox: false };
    rig.dispatcher.dispatch(Action::SetShow { show });
    rig.run("createEngine();");
    assert_eq!(rig.dispatcher.state().engine().borrow().overlay(), show);
    assert_eq!(rig.dispatcher.state().show(), show);
}

#[test]
fn render_calls_reach_the_view() {
    let mut rig = rig(seeded());
    rig.run("render(\"#stage\", svg(\"<svg></svg>\"));\nrender(\"#panel\", html(\"<p>hi</p>\"));");
    let mounts = rig.view.mounts();
    assert_eq!(mounts.len(), 2);
    assert_eq!(mounts[0].0, "#stage");
    assert_eq!(mounts[0].1.kind, MarkupKind::Svg);
    assert_eq!(mounts[1].1.kind, MarkupKind::Html);
}

#[test]
fn module_programs_defer_until_pump() {
    let mut rig = rig(seeded());
    rig.run("print(\"function path\");");
    let before = rig.dispatcher.state().logs().texts().iter().map(|t| t.to_string()).collect::<Vec<_>>();
    rig.dispatcher.drain_events();

    rig.run("import \"missing_module\" as m;\nprint(\"module path\");");
    assert_eq!(rig.dispatcher.sandbox().pending_modules(), 1);
    assert_eq!(rig.dispatcher.sandbox().live_blobs(), 1);
    assert_eq!(rig.dispatcher.state().logs().texts(), before);
    let queued = rig.dispatcher.drain_events();
    assert!(matches!(queued.last(), Some(StoreEvent::ModuleQueued { .. })));

    rig.dispatcher.pump();
    assert_eq!(rig.dispatcher.sandbox().pending_modules(), 0);
    assert_eq!(rig.dispatcher.sandbox().live_blobs(), 0);
    let loaded = rig.dispatcher.drain_events();
    assert!(loaded.iter().any(|event| matches!(event, StoreEvent::ModuleLoaded { .. })));
    assert_eq!(rig.dispatcher.state().logs().texts(), before);
}

#[test]
fn rand_is_reproducible_with_a_seed() {
    let program = "print(rand(0.0, 1.0));";
    let mut first = rig(seeded());
    let mut second = rig(seeded());
    first.run(program);
    second.run(program);
    assert_eq!(first.dispatcher.state().logs().texts(), second.dispatcher.state().logs().texts());
}

#[test]
fn muse_cues_are_recorded() {
    let mut rig = rig(seeded());
    rig.run("Muse.play(\"kick\"); Muse.play(\"snare\");");
    assert_eq!(rig.dispatcher.sandbox().audio().recent_cues(), vec!["kick", "snare"]);
}

#[test]
fn long_runs_report_trimmed_output() {
    let mut config = seeded();
    config.console.capacity = 3;
    let mut rig = rig(config);
    rig.run("for i in 0..5 { print(i); }");
    let logs = rig.dispatcher.state().logs();
    assert_eq!(logs.texts(), vec!["2", "3", "4"]);
    assert_eq!(logs.dropped(), 2);

    rig.run("print(\"short\");");
    assert_eq!(rig.dispatcher.state().logs().dropped(), 0);
}

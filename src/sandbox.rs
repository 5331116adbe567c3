//! Compiles program text with a fixed set of injected bindings and runs it,
//! capturing console output and turning failures into `ScriptFailure` values.
//!
//! Programs are recompiled from scratch on every run: the text is arbitrary and
//! may redefine anything, so nothing is carried over between runs apart from
//! the engine lifecycle the bindings point at.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhai::{Array, Dynamic, Engine, EvalAltResult, ParseError, Position, Scope};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use crate::audio::AudioHandle;
use crate::config::SandboxConfig;
use crate::host::Markup;
use crate::lifecycle::{EngineLifecycleHandle, EngineRef};
use crate::sprites::SpriteRegistry;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Compile,
    Run,
}

/// Diagnostic for a program that failed to compile or threw while running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptFailure {
    pub stage: FailureStage,
    pub kind: String,
    pub message: String,
    pub detail: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptFailure {
    fn from_parse(err: &ParseError) -> Self {
        Self::located(FailureStage::Compile, "ParseError", err.0.to_string(), err.to_string(), err.position())
    }

    fn from_eval(err: &EvalAltResult) -> Self {
        let (kind, message) = match err {
            EvalAltResult::ErrorRuntime(value, _) => ("RuntimeError", value.to_string()),
            EvalAltResult::ErrorVariableNotFound(name, _) => ("VariableNotFound", name.clone()),
            EvalAltResult::ErrorFunctionNotFound(name, _) => ("FunctionNotFound", name.clone()),
            EvalAltResult::ErrorTooManyOperations(_) => {
                ("TooManyOperations", "operation limit exceeded".to_string())
            }
            EvalAltResult::ErrorInFunctionCall(name, _, inner, _) => {
                let inner = Self::from_eval(inner);
                return Self {
                    kind: inner.kind,
                    message: format!("{} (in {name})", inner.message),
                    detail: err.to_string(),
                    ..Self::located(FailureStage::Run, "", String::new(), String::new(), err.position())
                };
            }
            other => ("EvalError", other.to_string()),
        };
        Self::located(FailureStage::Run, kind, message, err.to_string(), err.position())
    }

    fn located(stage: FailureStage, kind: &str, message: String, detail: String, pos: Position) -> Self {
        Self { stage, kind: kind.to_string(), message, detail, line: pos.line(), column: pos.position() }
    }

    /// Pretty JSON of every diagnostic field, as shown in the log panel.
    pub fn to_log_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.detail.clone())
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line}")?;
            if let Some(column) = self.column {
                write!(f, ", column {column}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptFailure {}

/// Snapshot of the store exposed to programs as `_state`, taken when the run
/// starts. Programs can read it but not write through it: the store only
/// changes inside action handlers, so a program that wants a change has to go
/// through the host.
#[derive(Debug, Clone)]
pub struct StateView {
    mouse_x: f64,
    mouse_y: f64,
    selected_sprite: String,
    name: String,
    sprite_names: Vec<String>,
}

impl StateView {
    pub fn capture(state: &AppState) -> Self {
        let (mouse_x, mouse_y) = state.mouse();
        Self {
            mouse_x,
            mouse_y,
            selected_sprite: state.selected_sprite().to_string(),
            name: state.name().to_string(),
            sprite_names: state.sprites().names().map(str::to_string).collect(),
        }
    }
}

/// Everything a function-path run injects into program scope.
pub struct Bindings<'a> {
    pub state: StateView,
    pub sprites: &'a SpriteRegistry,
    pub engine: EngineLifecycleHandle,
}

#[derive(Debug)]
pub struct RunReport {
    pub logs: Vec<String>,
    pub mounts: Vec<(String, Markup)>,
    pub result: Result<(), ScriptFailure>,
}

#[derive(Default)]
struct RunSink {
    logs: Vec<String>,
    mounts: Vec<(String, Markup)>,
}

#[derive(Debug)]
pub struct ModuleLoad {
    pub blob: String,
    pub result: Result<(), ScriptFailure>,
}

pub struct Sandbox {
    limits: SandboxConfig,
    audio: AudioHandle,
    rng: Rc<RefCell<StdRng>>,
    blobs: HashMap<String, String>,
    pending: VecDeque<String>,
}

impl Sandbox {
    pub fn new(limits: &SandboxConfig, audio: AudioHandle) -> Self {
        let rng = match limits.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            limits: limits.clone(),
            audio,
            rng: Rc::new(RefCell::new(rng)),
            blobs: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn audio(&self) -> &AudioHandle {
        &self.audio
    }

    /// Programs with an `import` statement take the module path.
    pub fn is_module_program(text: &str) -> bool {
        text.match_indices("import")
            .any(|(idx, word)| text[idx + word.len()..].chars().next().is_some_and(char::is_whitespace))
    }

    fn limited_engine(&self) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.limits.max_operations);
        engine.set_max_call_levels(self.limits.max_call_levels);
        engine.set_max_expr_depths(self.limits.max_expr_depth, self.limits.max_expr_depth);
        engine.set_max_string_size(self.limits.max_string_size);
        engine.set_max_array_size(self.limits.max_array_size);
        engine
    }

    /// Function path: compiles `program` against the injected bindings and runs it.
    pub fn execute(&self, program: &str, bindings: Bindings<'_>) -> RunReport {
        let sink = Rc::new(RefCell::new(RunSink::default()));
        let result = {
            let mut engine = self.bound_engine(&sink, &bindings.engine);
            let globals = self.globals(&bindings);
            // Resolved per lookup so user-defined `fn`s see the bindings too.
            // Locals of the same name shadow them.
            engine.on_var(move |name, index, context| {
                if index > 0 || context.scope().contains(name) {
                    return Ok(None);
                }
                Ok(globals.get(name).cloned())
            });
            let mut scope = Scope::new();
            match engine.compile(program) {
                Ok(ast) => {
                    engine.run_ast_with_scope(&mut scope, &ast).map_err(|err| ScriptFailure::from_eval(&err))
                }
                Err(err) => Err(ScriptFailure::from_parse(&err)),
            }
        };
        let RunSink { logs, mounts } = std::mem::take(&mut *sink.borrow_mut());
        if let Err(failure) = &result {
            debug!("[sandbox] run failed: {failure}");
        }
        RunReport { logs, mounts, result }
    }

    fn globals(&self, bindings: &Bindings<'_>) -> HashMap<String, Dynamic> {
        let mut globals = HashMap::with_capacity(bindings.sprites.len() + 2);
        for (name, sprite) in bindings.sprites.iter() {
            match rhai::serde::to_dynamic(sprite) {
                Ok(value) => {
                    globals.insert(name.to_string(), value);
                }
                Err(err) => warn!("[sandbox] sprite '{name}' not bound: {err}"),
            }
        }
        globals.insert("_state".to_string(), Dynamic::from(bindings.state.clone()));
        globals.insert("Muse".to_string(), Dynamic::from(self.audio.clone()));
        globals
    }

    fn bound_engine(&self, sink: &Rc<RefCell<RunSink>>, lifecycle: &EngineLifecycleHandle) -> Engine {
        let mut engine = self.limited_engine();

        let out = Rc::clone(sink);
        engine.on_print(move |text| {
            info!(target: "script", "{text}");
            out.borrow_mut().logs.push(text.to_string());
        });
        let out = Rc::clone(sink);
        engine.on_debug(move |text, _source, pos| {
            info!(target: "script", "{text} @ {pos:?}");
            out.borrow_mut().logs.push(text.to_string());
        });

        engine.register_type_with_name::<StateView>("State");
        engine.register_get("mouse_x", |view: &mut StateView| view.mouse_x);
        engine.register_get("mouse_y", |view: &mut StateView| view.mouse_y);
        engine.register_get("selected_sprite", |view: &mut StateView| view.selected_sprite.clone());
        engine.register_get("name", |view: &mut StateView| view.name.clone());
        engine.register_get("sprite_names", |view: &mut StateView| {
            view.sprite_names.iter().cloned().map(Dynamic::from).collect::<Array>()
        });

        engine.register_type_with_name::<Markup>("Markup");
        engine.register_fn("html", |source: &str| Markup::html(source));
        engine.register_fn("svg", |source: &str| Markup::svg(source));
        engine.register_fn("to_string", |markup: &mut Markup| markup.to_string());
        let out = Rc::clone(sink);
        engine.register_fn("render", move |target: &str, markup: Markup| {
            out.borrow_mut().mounts.push((target.to_string(), markup));
        });

        engine.register_type_with_name::<EngineRef>("Engine");
        engine.register_get("generation", |handle: &mut EngineRef| handle.generation() as rhai::INT);
        engine.register_get("animation_frame", |handle: &mut EngineRef| {
            handle.animation_frame().map_or(Dynamic::UNIT, |frame| Dynamic::from(frame.0 as rhai::INT))
        });
        let lc = lifecycle.clone();
        engine.register_fn("createEngine", move || create_engine(&lc, &[]));
        let lc = lifecycle.clone();
        engine.register_fn("createEngine", move |a: Dynamic| create_engine(&lc, &[a]));
        let lc = lifecycle.clone();
        engine.register_fn("createEngine", move |a: Dynamic, b: Dynamic| create_engine(&lc, &[a, b]));
        let lc = lifecycle.clone();
        engine.register_fn("createEngine", move |a: Dynamic, b: Dynamic, c: Dynamic| {
            create_engine(&lc, &[a, b, c])
        });
        let lc = lifecycle.clone();
        engine.register_fn("createEngine", move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
            create_engine(&lc, &[a, b, c, d])
        });

        engine.register_type_with_name::<AudioHandle>("Muse");
        // Resolved bindings are read-only, so these take the handle by value. Clones share the cues.
        engine.register_fn("play", |mut audio: AudioHandle, label: &str| audio.play(label));
        engine.register_fn("stop", |mut audio: AudioHandle| audio.stop());

        let rng = Rc::clone(&self.rng);
        engine.register_fn("rand", move |min: rhai::FLOAT, max: rhai::FLOAT| {
            if min < max {
                rng.borrow_mut().gen_range(min..max)
            } else {
                min
            }
        });

        engine
    }

    /// Module path: stores the text under a temporary blob id and defers the load
    /// until `load_pending_modules`.
    pub fn queue_module(&mut self, program: &str) -> String {
        let blob = format!("blob:{}", Uuid::new_v4());
        self.blobs.insert(blob.clone(), program.to_string());
        self.pending.push_back(blob.clone());
        blob
    }

    pub fn pending_modules(&self) -> usize {
        self.pending.len()
    }

    pub fn live_blobs(&self) -> usize {
        self.blobs.len()
    }

    /// Evaluates queued modules with ambient bindings only and revokes their
    /// blobs. Output goes to the host log, never to the store.
    pub fn load_pending_modules(&mut self) -> Vec<ModuleLoad> {
        let mut loads = Vec::new();
        while let Some(blob) = self.pending.pop_front() {
            let Some(source) = self.blobs.remove(&blob) else {
                continue;
            };
            let mut engine = self.limited_engine();
            engine.on_print(|text| info!(target: "script", "{text}"));
            engine.on_debug(|text, _source, pos| info!(target: "script", "{text} @ {pos:?}"));
            let result = match engine.compile(&source) {
                Ok(ast) => engine.run_ast(&ast).map_err(|err| ScriptFailure::from_eval(&err)),
                Err(err) => Err(ScriptFailure::from_parse(&err)),
            };
            if let Err(failure) = &result {
                warn!("[sandbox] module {blob} failed: {failure}");
            }
            loads.push(ModuleLoad { blob, result });
        }
        loads
    }
}

fn create_engine(
    lifecycle: &EngineLifecycleHandle,
    args: &[Dynamic],
) -> Result<EngineRef, Box<EvalAltResult>> {
    let values = args
        .iter()
        .map(|arg| rhai::serde::from_dynamic::<serde_json::Value>(arg))
        .collect::<Result<Vec<_>, _>>()?;
    lifecycle.borrow_mut().replace(values).map_err(|err| format!("{err:#}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{RecordingScheduler, TickingEngineFactory};
    use crate::lifecycle::EngineLifecycle;
    use crate::sprites::{Sprite, SpriteCanvas};

    fn lifecycle() -> EngineLifecycleHandle {
        EngineLifecycleHandle::new(EngineLifecycle::new(
            Box::new(TickingEngineFactory::default()),
            Box::new(RecordingScheduler::default()),
        ))
    }

    fn view() -> StateView {
        StateView {
            mouse_x: 3.0,
            mouse_y: 4.0,
            selected_sprite: "sprite_abc".to_string(),
            name: "demo".to_string(),
            sprite_names: vec!["sprite_abc".to_string()],
        }
    }

    fn sandbox() -> Sandbox {
        let limits = SandboxConfig { deterministic_seed: Some(1), ..SandboxConfig::default() };
        Sandbox::new(&limits, AudioHandle::new(8))
    }

    fn run(program: &str, sprites: &SpriteRegistry) -> RunReport {
        sandbox().execute(program, Bindings { state: view(), sprites, engine: lifecycle() })
    }

    #[test]
    fn detects_import_statements() {
        assert!(Sandbox::is_module_program("import \"lib\" as lib;\nlib::go();"));
        assert!(Sandbox::is_module_program("let a = 1;\nimport\t\"x\" as x;"));
        assert!(!Sandbox::is_module_program("let important = 1;"));
        assert!(!Sandbox::is_module_program("print(\"import\")"));
    }

    #[test]
    fn captures_print_and_state_bindings() {
        let program = "print(_state.mouse_x + _state.mouse_y); print(_state.selected_sprite);";
        let report = run(program, &SpriteRegistry::new());
        assert!(report.result.is_ok(), "{:?}", report.result);
        assert_eq!(report.logs, vec!["7.0".to_string(), "sprite_abc".to_string()]);
    }

    #[test]
    fn sprites_are_top_level_names() {
        let canvas = SpriteCanvas::new(2, 2);
        let mut sprites = SpriteRegistry::new();
        sprites.insert("hero", Sprite::blank(canvas));
        let report = run("print(hero.colors.len());", &sprites);
        assert!(report.result.is_ok(), "{:?}", report.result);
        assert_eq!(report.logs, vec!["4".to_string()]);
    }

    #[test]
    fn functions_see_injected_names() {
        let canvas = SpriteCanvas::new(2, 2);
        let mut sprites = SpriteRegistry::new();
        sprites.insert("hero", Sprite::blank(canvas));
        let program = r#"
            fn pixels() { hero.colors.len() }
            fn pointer() { _state.mouse_x }
            fn cue() { Muse.play("hat"); 1 }
            print(pixels());
            print(pointer());
            print(cue());
        "#;
        let sandbox = sandbox();
        let bindings = Bindings { state: view(), sprites: &sprites, engine: lifecycle() };
        let report = sandbox.execute(program, bindings);
        assert!(report.result.is_ok(), "{:?}", report.result);
        assert_eq!(report.logs, vec!["4".to_string(), "3.0".to_string(), "1".to_string()]);
        assert_eq!(sandbox.audio().recent_cues(), vec!["hat".to_string()]);
    }

    #[test]
    fn locals_shadow_injected_names() {
        let canvas = SpriteCanvas::new(2, 2);
        let mut sprites = SpriteRegistry::new();
        sprites.insert("hero", Sprite::blank(canvas));
        let program = "let hero = 5; print(hero); fn f(hero) { hero * 2 } print(f(3));";
        let report = run(program, &sprites);
        assert!(report.result.is_ok(), "{:?}", report.result);
        assert_eq!(report.logs, vec!["5".to_string(), "6".to_string()]);
    }

    #[test]
    fn render_primitives_collect_mounts() {
        let program = r#"render("root", html("<p>hi</p>")); render("bg", svg("<rect/>"));"#;
        let report = run(program, &SpriteRegistry::new());
        assert!(report.result.is_ok(), "{:?}", report.result);
        assert_eq!(
            report.mounts,
            vec![("root".to_string(), Markup::html("<p>hi</p>")), ("bg".to_string(), Markup::svg("<rect/>"))]
        );
    }

    #[test]
    fn thrown_values_become_runtime_failures() {
        let report = run("print(\"hi\");\nthrow \"boom\";", &SpriteRegistry::new());
        assert_eq!(report.logs, vec!["hi".to_string()]);
        let failure = report.result.expect_err("throw should fail the run");
        assert_eq!(failure.stage, FailureStage::Run);
        assert_eq!(failure.kind, "RuntimeError");
        assert_eq!(failure.message, "boom");
        assert_eq!(failure.line, Some(2));
        let text = failure.to_log_text();
        assert!(text.contains("\"kind\": \"RuntimeError\""), "{text}");
    }

    #[test]
    fn syntax_errors_fail_at_compile_stage() {
        let report = run("let = ;", &SpriteRegistry::new());
        let failure = report.result.expect_err("parse error expected");
        assert_eq!(failure.stage, FailureStage::Compile);
        assert_eq!(failure.kind, "ParseError");
        assert!(report.logs.is_empty());
    }

    #[test]
    fn runaway_loops_hit_the_operation_limit() {
        let limits = SandboxConfig { max_operations: 10_000, ..SandboxConfig::default() };
        let sandbox = Sandbox::new(&limits, AudioHandle::new(8));
        let sprites = SpriteRegistry::new();
        let bindings = Bindings { state: view(), sprites: &sprites, engine: lifecycle() };
        let report = sandbox.execute("loop { }", bindings);
        assert_eq!(report.result.expect_err("limit expected").kind, "TooManyOperations");
    }

    #[test]
    fn muse_records_cues() {
        let sandbox = sandbox();
        let sprites = SpriteRegistry::new();
        let bindings = Bindings { state: view(), sprites: &sprites, engine: lifecycle() };
        let report = sandbox.execute("Muse.play(\"kick\");", bindings);
        assert!(report.result.is_ok(), "{:?}", report.result);
        assert_eq!(sandbox.audio().recent_cues(), vec!["kick".to_string()]);
    }

    #[test]
    fn modules_run_later_and_release_their_blob() {
        let mut sandbox = sandbox();
        let blob = sandbox.queue_module("import \"missing_module\" as m;");
        assert!(blob.starts_with("blob:"));
        assert_eq!((sandbox.pending_modules(), sandbox.live_blobs()), (1, 1));
        let loads = sandbox.load_pending_modules();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].blob, blob);
        assert!(loads[0].result.is_err(), "unresolvable import should fail");
        assert_eq!((sandbox.pending_modules(), sandbox.live_blobs()), (0, 0));
    }

    #[test]
    fn modules_do_not_see_injected_bindings() {
        let mut sandbox = sandbox();
        sandbox.queue_module("print(_state.name);");
        let loads = sandbox.load_pending_modules();
        assert_eq!(loads[0].result.as_ref().expect_err("no _state in module scope").kind, "VariableNotFound");
    }
}

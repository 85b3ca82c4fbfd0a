use std::fs;
use std::mem;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Vec2, Vec4};
use rand::Rng;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope, AST};

use crate::assets::{ContentHandle, FontHandle, TextureHandle};
use crate::error::HostError;
use crate::surface::{GraphicsHandle, SpriteBatch, SurfaceHandle, WHITE};
use crate::time::Tick;

/// Global accessor names the entry script resolves host objects through.
pub const HOST_SURFACE: &str = "surface";
pub const HOST_GRAPHICS: &str = "graphics";
pub const HOST_BATCH: &str = "batch";
pub const HOST_CONTENT: &str = "content";
pub const HOST_APP: &str = "app";

/// Lifecycle hooks the entry script may define; any subset is valid.
pub const HOOK_INITIALIZE: &str = "Initialize";
pub const HOOK_LOAD_CONTENT: &str = "LoadContent";
pub const HOOK_UPDATE: &str = "Update";
pub const HOOK_DRAW: &str = "Draw";

#[derive(Debug, Default)]
struct AppState {
    logs: Vec<String>,
    exit: bool,
}

/// Handle on the embedding application itself, exposed to scripts as `app()`.
#[derive(Debug, Clone, Default)]
pub struct AppHandle {
    state: Arc<Mutex<AppState>>,
}

impl AppHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, message: &str) {
        log::info!("[script] {message}");
        self.lock().logs.push(message.to_string());
    }

    pub fn drain_logs(&self) -> Vec<String> {
        mem::take(&mut self.lock().logs)
    }

    pub fn quit(&self) {
        self.lock().exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.lock().exit
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The fixed set of host objects injected into every runtime instance. The
/// host owns the underlying state; these are shared handles onto it, and the
/// same set is re-injected verbatim on every reload.
#[derive(Clone)]
pub struct HostBindings {
    pub surface: SurfaceHandle,
    pub graphics: GraphicsHandle,
    pub batch: SpriteBatch,
    pub content: ContentHandle,
    pub app: AppHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptFn {
    name: &'static str,
    arity: usize,
}

impl ScriptFn {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Hook functions resolved from the entry script, once per (re)load.
/// Invoking an absent hook is a defined no-op, not a dispatch failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackTable {
    pub initialize: Option<ScriptFn>,
    pub load_content: Option<ScriptFn>,
    pub update: Option<ScriptFn>,
    pub draw: Option<ScriptFn>,
}

impl CallbackTable {
    fn resolve(ast: &AST) -> Self {
        let find = |name: &'static str, arity: usize| {
            ast.iter_functions()
                .any(|f| f.name == name && f.params.len() == arity)
                .then_some(ScriptFn { name, arity })
        };
        Self {
            initialize: find(HOOK_INITIALIZE, 0),
            load_content: find(HOOK_LOAD_CONTENT, 0),
            update: find(HOOK_UPDATE, 1),
            draw: find(HOOK_DRAW, 1),
        }
    }
}

struct RuntimeInstance {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    state: Dynamic,
    callbacks: CallbackTable,
}

/// Owns at most one live script runtime. A reload consumes the previous
/// instance before the replacement engine is even constructed, so the old
/// global namespace can never leak into the new program.
pub struct ScriptRuntime {
    instance: Option<RuntimeInstance>,
}

impl ScriptRuntime {
    pub fn new() -> Self {
        Self { instance: None }
    }

    pub fn loaded(&self) -> bool {
        self.instance.is_some()
    }

    pub fn callbacks(&self) -> Option<&CallbackTable> {
        self.instance.as_ref().map(|instance| &instance.callbacks)
    }

    pub fn unload(&mut self) {
        self.instance = None;
    }

    /// Tears down the previous program and loads `entry` fresh: new engine,
    /// host objects re-injected, top-level statements executed, hooks
    /// resolved, then `Initialize` invoked once if the script defines it.
    ///
    /// A failing `Initialize` still leaves the program loaded; its other
    /// hooks remain callable once the caller clears the fault.
    pub fn reload(&mut self, entry: &Path, bindings: &HostBindings) -> Result<(), HostError> {
        self.instance = None;

        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        register_host_api(&mut engine);
        register_bindings(&mut engine, bindings);

        let source = fs::read_to_string(entry).map_err(|err| HostError::ScriptLoad {
            message: format!("reading '{}': {err}", entry.display()),
        })?;
        let ast = engine.compile(&source).map_err(|err| HostError::ScriptLoad {
            message: format!("compiling '{}': {err}", entry.display()),
        })?;
        let mut scope = Scope::new();
        engine.run_ast_with_scope(&mut scope, &ast).map_err(|err| HostError::ScriptLoad {
            message: format!("executing '{}': {err}", entry.display()),
        })?;

        let callbacks = CallbackTable::resolve(&ast);
        self.instance =
            Some(RuntimeInstance { engine, ast, scope, state: Dynamic::from(Map::new()), callbacks });
        self.call(|callbacks| callbacks.initialize, ())
    }

    pub fn invoke_load_content(&mut self) -> Result<(), HostError> {
        self.call(|callbacks| callbacks.load_content, ())
    }

    pub fn invoke_update(&mut self, tick: Tick) -> Result<(), HostError> {
        self.call(|callbacks| callbacks.update, (tick,))
    }

    pub fn invoke_draw(&mut self, tick: Tick) -> Result<(), HostError> {
        self.call(|callbacks| callbacks.draw, (tick,))
    }

    fn call(
        &mut self,
        slot: impl Fn(&CallbackTable) -> Option<ScriptFn>,
        args: impl FuncArgs,
    ) -> Result<(), HostError> {
        let Some(instance) = self.instance.as_mut() else { return Ok(()) };
        let Some(func) = slot(&instance.callbacks) else { return Ok(()) };
        let RuntimeInstance { engine, ast, scope, state, .. } = instance;
        // Top-level statements already ran at load; hooks share one `this`
        // map that survives between ticks and dies with the instance.
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true).bind_this_ptr(state);
        match engine.call_fn_with_options::<Dynamic>(options, scope, ast, func.name, args) {
            Ok(_) => Ok(()),
            Err(err) if matches!(err.as_ref(), EvalAltResult::ErrorFunctionNotFound(..)) => Ok(()),
            Err(err) => {
                Err(HostError::ScriptRuntime { hook: func.name, message: err.to_string() })
            }
        }
    }
}

fn register_host_api(engine: &mut Engine) {
    engine.register_type_with_name::<Tick>("Tick");
    engine.register_get("delta", |tick: &mut Tick| tick.delta as f64);
    engine.register_get("elapsed", |tick: &mut Tick| tick.elapsed as f64);
    engine.register_get("frame", |tick: &mut Tick| tick.frame as i64);

    engine.register_type_with_name::<SurfaceHandle>("Surface");
    engine.register_fn("clear", |surface: &mut SurfaceHandle, r: f64, g: f64, b: f64| {
        surface.clear(Vec4::new(r as f32, g as f32, b as f32, 1.0));
    });
    engine.register_fn("width", |surface: &mut SurfaceHandle| surface.size().0 as i64);
    engine.register_fn("height", |surface: &mut SurfaceHandle| surface.size().1 as i64);

    engine.register_type_with_name::<GraphicsHandle>("Graphics");
    engine.register_fn("set_title", |graphics: &mut GraphicsHandle, title: &str| {
        graphics.set_title(title);
    });
    engine.register_fn("set_vsync", |graphics: &mut GraphicsHandle, on: bool| {
        graphics.set_vsync(on);
    });
    engine.register_fn("resize", |graphics: &mut GraphicsHandle, width: i64, height: i64| {
        graphics.resize(width.max(0) as u32, height.max(0) as u32);
    });

    engine.register_type_with_name::<SpriteBatch>("SpriteBatch");
    engine.register_fn(
        "draw_text",
        |batch: &mut SpriteBatch, font: FontHandle, text: &str, x: f64, y: f64| {
            batch.draw_text(font, text, Vec2::new(x as f32, y as f32), WHITE);
        },
    );
    engine.register_fn(
        "draw_text",
        |batch: &mut SpriteBatch,
         font: FontHandle,
         text: &str,
         x: f64,
         y: f64,
         r: f64,
         g: f64,
         b: f64,
         a: f64| {
            let color = Vec4::new(r as f32, g as f32, b as f32, a as f32);
            batch.draw_text(font, text, Vec2::new(x as f32, y as f32), color);
        },
    );
    engine.register_fn(
        "draw_sprite",
        |batch: &mut SpriteBatch, texture: TextureHandle, x: f64, y: f64| {
            batch.draw_sprite(texture, Vec2::new(x as f32, y as f32), 1.0, 0.0, WHITE);
        },
    );
    engine.register_fn(
        "draw_sprite",
        |batch: &mut SpriteBatch, texture: TextureHandle, x: f64, y: f64, scale: f64, rotation: f64| {
            batch.draw_sprite(texture, Vec2::new(x as f32, y as f32), scale as f32, rotation as f32, WHITE);
        },
    );

    engine.register_type_with_name::<TextureHandle>("Texture");
    engine.register_get("name", |texture: &mut TextureHandle| texture.name().to_string());
    engine.register_get("width", |texture: &mut TextureHandle| texture.width() as i64);
    engine.register_get("height", |texture: &mut TextureHandle| texture.height() as i64);

    engine.register_type_with_name::<FontHandle>("Font");
    engine.register_get("name", |font: &mut FontHandle| font.name().to_string());
    engine.register_get("glyph_width", |font: &mut FontHandle| font.glyph_width() as i64);
    engine.register_get("glyph_height", |font: &mut FontHandle| font.glyph_height() as i64);

    engine.register_type_with_name::<ContentHandle>("Content");
    engine.register_fn(
        "load_texture",
        |content: &mut ContentHandle, name: &str| -> Result<TextureHandle, Box<EvalAltResult>> {
            content.load_texture(name).map_err(|err| err.to_string().into())
        },
    );
    engine.register_fn(
        "load_font",
        |content: &mut ContentHandle, name: &str| -> Result<FontHandle, Box<EvalAltResult>> {
            content.load_font(name).map_err(|err| err.to_string().into())
        },
    );

    engine.register_type_with_name::<AppHandle>("App");
    engine.register_fn("log", |app: &mut AppHandle, message: &str| app.log(message));
    engine.register_fn("quit", |app: &mut AppHandle| app.quit());

    engine.register_fn("rand", |min: f64, max: f64| {
        if max > min {
            rand::thread_rng().gen_range(min..max)
        } else {
            min
        }
    });
}

fn register_bindings(engine: &mut Engine, bindings: &HostBindings) {
    let surface = bindings.surface.clone();
    engine.register_fn(HOST_SURFACE, move || surface.clone());
    let graphics = bindings.graphics.clone();
    engine.register_fn(HOST_GRAPHICS, move || graphics.clone());
    let batch = bindings.batch.clone();
    engine.register_fn(HOST_BATCH, move || batch.clone());
    let content = bindings.content.clone();
    engine.register_fn(HOST_CONTENT, move || content.clone());
    let app = bindings.app.clone();
    engine.register_fn(HOST_APP, move || app.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetCache;
    use crate::config::WindowConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_script(contents: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().expect("temp script");
        write!(temp, "{contents}").expect("write script");
        temp
    }

    fn test_bindings() -> HostBindings {
        let surface = SurfaceHandle::new(320, 240);
        HostBindings {
            surface: surface.clone(),
            graphics: GraphicsHandle::new(&WindowConfig::default()),
            batch: SpriteBatch::new(surface),
            content: ContentHandle::new(AssetCache::new("assets")),
            app: AppHandle::new(),
        }
    }

    #[test]
    fn resolves_only_defined_hooks() {
        let script = write_script("fn Draw(tick) { }\n");
        let bindings = test_bindings();
        let mut runtime = ScriptRuntime::new();
        runtime.reload(script.path(), &bindings).expect("load");
        let callbacks = runtime.callbacks().expect("loaded");
        assert!(callbacks.initialize.is_none());
        assert!(callbacks.load_content.is_none());
        assert!(callbacks.update.is_none());
        assert_eq!(callbacks.draw.map(|f| f.name()), Some(HOOK_DRAW));
    }

    #[test]
    fn hook_with_wrong_arity_is_treated_as_absent() {
        let script = write_script("fn Update() { }\nfn Initialize(x) { }\n");
        let bindings = test_bindings();
        let mut runtime = ScriptRuntime::new();
        runtime.reload(script.path(), &bindings).expect("load");
        let callbacks = runtime.callbacks().expect("loaded");
        assert!(callbacks.update.is_none(), "Update must take the tick argument");
        assert!(callbacks.initialize.is_none(), "Initialize must take no arguments");
    }

    #[test]
    fn syntax_error_reports_script_load_and_leaves_nothing_loaded() {
        let script = write_script("fn Update(tick) {\n");
        let bindings = test_bindings();
        let mut runtime = ScriptRuntime::new();
        let err = runtime.reload(script.path(), &bindings).expect_err("should not compile");
        assert!(matches!(err, HostError::ScriptLoad { .. }), "got {err:?}");
        assert!(!runtime.loaded());
    }

    #[test]
    fn failing_initialize_still_leaves_program_loaded() {
        let script = write_script(
            r#"
            fn Initialize() { throw "broken setup"; }
            fn Update(tick) { app().log("updated"); }
            "#,
        );
        let bindings = test_bindings();
        let mut runtime = ScriptRuntime::new();
        let err = runtime.reload(script.path(), &bindings).expect_err("Initialize throws");
        assert!(
            matches!(&err, HostError::ScriptRuntime { hook, .. } if *hook == HOOK_INITIALIZE),
            "got {err:?}"
        );
        assert!(runtime.loaded(), "a failed Initialize must not unload the program");

        runtime.invoke_update(Tick { delta: 0.016, elapsed: 0.016, frame: 1 }).expect("update runs");
        assert_eq!(bindings.app.drain_logs(), vec!["updated".to_string()]);
    }

    #[test]
    fn top_level_statements_run_once_at_load() {
        let script = write_script(
            r#"
            app().log("loaded");
            fn Update(tick) { }
            "#,
        );
        let bindings = test_bindings();
        let mut runtime = ScriptRuntime::new();
        runtime.reload(script.path(), &bindings).expect("load");
        for frame in 1..=3 {
            runtime
                .invoke_update(Tick { delta: 0.016, elapsed: 0.016 * frame as f32, frame })
                .expect("update");
        }
        assert_eq!(bindings.app.drain_logs(), vec!["loaded".to_string()]);
    }

    #[test]
    fn this_state_persists_between_ticks_and_resets_on_reload() {
        let source = r#"
            fn Initialize() { this.count = 0; }
            fn Update(tick) {
                this.count += 1;
                app().log(`count ${this.count}`);
            }
        "#;
        let script = write_script(source);
        let bindings = test_bindings();
        let mut runtime = ScriptRuntime::new();
        runtime.reload(script.path(), &bindings).expect("load");
        for frame in 1..=2 {
            runtime
                .invoke_update(Tick { delta: 0.016, elapsed: 0.016 * frame as f32, frame })
                .expect("update");
        }
        runtime.reload(script.path(), &bindings).expect("reload");
        runtime.invoke_update(Tick { delta: 0.016, elapsed: 0.048, frame: 3 }).expect("update");
        assert_eq!(
            bindings.app.drain_logs(),
            vec!["count 1".to_string(), "count 2".to_string(), "count 1".to_string()],
        );
    }

    #[test]
    fn invoking_without_a_loaded_program_is_a_no_op() {
        let mut runtime = ScriptRuntime::new();
        runtime.invoke_update(Tick { delta: 0.0, elapsed: 0.0, frame: 0 }).expect("no-op");
        runtime.invoke_draw(Tick { delta: 0.0, elapsed: 0.0, frame: 0 }).expect("no-op");
        runtime.invoke_load_content().expect("no-op");
    }
}

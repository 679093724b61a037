use super::input::{ActionStates, InputAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    Overworld,
    Underground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneKey),
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// Edge-triggered: true only for the tick the press happened in.
    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.actions.just_pressed(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set_pressed(action, true);
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    /// Unit-length movement direction from the held move actions, or zero.
    pub fn move_axis(&self) -> Vec2 {
        let mut dx = 0.0;
        let mut dy = 0.0;
        if self.is_down(InputAction::MoveLeft) {
            dx = -1.0;
        } else if self.is_down(InputAction::MoveRight) {
            dx = 1.0;
        }
        if self.is_down(InputAction::MoveUp) {
            dy = -1.0;
        } else if self.is_down(InputAction::MoveDown) {
            dy = 1.0;
        }
        Vec2 { x: dx, y: dy }.normalized_or_zero()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized_or_zero(self) -> Self {
        let length = self.length();
        if length <= f32::EPSILON || !length.is_finite() {
            return Self::ZERO;
        }
        Self {
            x: self.x / length,
            y: self.y / length,
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn offset(self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle in map pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centered_on(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
            width,
            height,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2 {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Clamps a point so that a body of the given half extents stays inside.
    pub fn clamp_point(&self, point: Vec2, half_width: f32, half_height: f32) -> Vec2 {
        let min_x = self.x + half_width;
        let max_x = (self.right() - half_width).max(min_x);
        let min_y = self.y + half_height;
        let max_y = (self.bottom() - half_height).max(min_y);
        Vec2 {
            x: point.x.clamp(min_x, max_x),
            y: point.y.clamp(min_y, max_y),
        }
    }
}

/// A scene borrows the shared context `C` on every call; it never owns it.
pub trait Scene<C> {
    fn load(&mut self, context: &mut C);
    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot, context: &mut C)
        -> SceneCommand;
    fn unload(&mut self, context: &mut C);
    fn debug_title(&self) -> Option<String> {
        None
    }
}

struct SceneRuntime<C> {
    scene: Box<dyn Scene<C>>,
    is_loaded: bool,
}

pub struct SceneMachine<C> {
    overworld: SceneRuntime<C>,
    underground: SceneRuntime<C>,
    active_scene: SceneKey,
    context: C,
}

impl<C> SceneMachine<C> {
    pub fn new(
        overworld: Box<dyn Scene<C>>,
        underground: Box<dyn Scene<C>>,
        active_scene: SceneKey,
        context: C,
    ) -> Self {
        Self {
            overworld: SceneRuntime {
                scene: overworld,
                is_loaded: false,
            },
            underground: SceneRuntime {
                scene: underground,
                is_loaded: false,
            },
            active_scene,
            context,
        }
    }

    pub fn active_scene(&self) -> SceneKey {
        self.active_scene
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    pub fn load_active(&mut self) {
        let key = self.active_scene;
        self.load_scene_if_needed(key);
    }

    pub fn update_active(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        let Self {
            overworld,
            underground,
            active_scene,
            context,
        } = self;
        let runtime = match active_scene {
            SceneKey::Overworld => overworld,
            SceneKey::Underground => underground,
        };
        runtime.scene.update(fixed_dt_seconds, input, context)
    }

    pub fn debug_title_active(&self) -> Option<String> {
        self.runtime_ref(self.active_scene).scene.debug_title()
    }

    /// Unloads the current scene before entering the next one, so the next scene's
    /// `load` observes everything the previous scene wrote into the context.
    pub fn switch_to(&mut self, next_scene: SceneKey) -> bool {
        if self.active_scene == next_scene {
            return false;
        }

        self.unload_scene_if_loaded(self.active_scene);
        self.load_scene_if_needed(next_scene);
        self.active_scene = next_scene;
        true
    }

    pub fn shutdown_all(&mut self) {
        self.unload_scene_if_loaded(SceneKey::Overworld);
        self.unload_scene_if_loaded(SceneKey::Underground);
    }

    fn load_scene_if_needed(&mut self, key: SceneKey) {
        let Self {
            overworld,
            underground,
            context,
            ..
        } = self;
        let runtime = match key {
            SceneKey::Overworld => overworld,
            SceneKey::Underground => underground,
        };
        if runtime.is_loaded {
            return;
        }
        runtime.scene.load(context);
        runtime.is_loaded = true;
    }

    fn unload_scene_if_loaded(&mut self, key: SceneKey) {
        let Self {
            overworld,
            underground,
            context,
            ..
        } = self;
        let runtime = match key {
            SceneKey::Overworld => overworld,
            SceneKey::Underground => underground,
        };
        if !runtime.is_loaded {
            return;
        }
        runtime.scene.unload(context);
        runtime.is_loaded = false;
    }

    fn runtime_ref(&self, key: SceneKey) -> &SceneRuntime<C> {
        match key {
            SceneKey::Overworld => &self.overworld,
            SceneKey::Underground => &self.underground,
        }
    }
}

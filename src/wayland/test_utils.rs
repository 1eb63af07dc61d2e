use crate::utils::{Logical, Rectangle};
use crate::wayland::{
    compositor::{
        handle_surface_request, CompositorConfig, CompositorHandler, CompositorState, Role, RoleKind, RoleSurface,
        Surface, SurfaceId, SurfaceRequest,
    },
    output::Output,
    session_lock::{self, get_lock_surface, LockSurface, SessionLockHandler, SessionLockState, SessionLocker},
    shell::{
        wlr_layer::{
            get_layer_surface, handle_layer_surface_request, Anchor, Layer, LayerGeometry, LayerSurface,
            LayerSurfaceRequest, WlrLayerShellHandler, WlrLayerShellState,
        },
        xdg::{
            get_popup, get_toplevel, handle_popup_request, handle_toplevel_request, PopupParent, PopupRequest,
            PopupSurface, Positioner, PositionerState, ToplevelRequest, ToplevelSurface, XdgShellHandler,
            XdgShellState,
        },
    },
    Client,
};

/// A compositor recording what its handlers were told
pub(crate) struct TestState {
    pub client: Client,
    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub layer_shell_state: WlrLayerShellState,
    pub session_lock_state: SessionLockState,
    pub output: Output,
    outputs: Vec<Output>,
    pub commits: Vec<SurfaceId>,
    pub destroyed: Vec<SurfaceId>,
    pub repositions: Vec<u32>,
    pub maximize_requests: usize,
    pub placements: Vec<(LayerSurface, LayerGeometry)>,
    pub lockers: Vec<SessionLocker>,
    pub unlocks: usize,
}

impl TestState {
    pub fn new() -> TestState {
        TestState::with_config(CompositorConfig::default())
    }

    pub fn with_config(config: CompositorConfig) -> TestState {
        init_logging();
        TestState {
            client: Client::new(),
            compositor_state: CompositorState::new(config),
            xdg_shell_state: XdgShellState::new(),
            layer_shell_state: WlrLayerShellState::new(),
            session_lock_state: SessionLockState::new(),
            output: Output::new("HEADLESS-1".into(), full_hd()),
            outputs: Vec::new(),
            commits: Vec::new(),
            destroyed: Vec::new(),
            repositions: Vec::new(),
            maximize_requests: 0,
            placements: Vec::new(),
            lockers: Vec::new(),
            unlocks: 0,
        }
    }

    pub fn create_surface(&mut self) -> Surface {
        let client = self.client.clone();
        self.compositor_state.create_surface(&client)
    }

    pub fn destroy_surface(&mut self, surface: &Surface) {
        handle_surface_request(self, surface, SurfaceRequest::Destroy);
    }

    /// Give `surface` a role of the given kind, without committing it
    pub fn make_role(&mut self, kind: RoleKind, surface: &Surface) -> Role {
        match kind {
            RoleKind::Toplevel => Role::Toplevel(self.toplevel(surface)),
            RoleKind::Popup => {
                let positioner = positioner_for(Rectangle::from_loc_and_size((0, 0), (10, 10)));
                Role::Popup(get_popup(self, surface, None, &positioner).unwrap())
            }
            RoleKind::LayerSurface => Role::LayerSurface(self.layer_surface(surface)),
            RoleKind::LockSurface => Role::LockSurface(self.lock_surface(surface)),
        }
    }

    pub fn toplevel(&mut self, surface: &Surface) -> ToplevelSurface {
        get_toplevel(self, surface).unwrap()
    }

    /// A toplevel whose initial configure was acked and committed
    pub fn mapped_toplevel(&mut self) -> ToplevelSurface {
        let surface = self.create_surface();
        self.map_toplevel(&surface)
    }

    pub fn mapped_toplevel_for(&mut self, client: Client) -> ToplevelSurface {
        let surface = self.compositor_state.create_surface(&client);
        self.map_toplevel(&surface)
    }

    fn map_toplevel(&mut self, surface: &Surface) -> ToplevelSurface {
        let toplevel = self.toplevel(surface);
        handle_surface_request(self, surface, SurfaceRequest::Commit);
        let serial = toplevel.pending_configures()[0];
        handle_toplevel_request(self, &toplevel, ToplevelRequest::AckConfigure(serial));
        handle_surface_request(self, surface, SurfaceRequest::Commit);
        surface.client().drain_events();
        toplevel
    }

    /// A non-reactive popup of the size of its anchor rectangle, not committed
    pub fn popup_for<P>(&mut self, parent: &P, anchor: Rectangle<i32, Logical>) -> PopupSurface
    where
        P: Clone + Into<PopupParent>,
    {
        let surface = self.create_surface();
        self.popup_with(&surface, parent, &positioner_for(anchor))
    }

    pub fn popup_with<P>(&mut self, surface: &Surface, parent: &P, positioner: &Positioner) -> PopupSurface
    where
        P: Clone + Into<PopupParent>,
    {
        get_popup(self, surface, Some(parent.clone().into()), positioner).unwrap()
    }

    pub fn destroy_popup(&mut self, popup: &PopupSurface) {
        let surface = popup.wl_surface().unwrap();
        handle_popup_request(self, popup, PopupRequest::Destroy);
        self.destroy_surface(&surface);
    }

    /// A background layer surface on the test output, not committed
    pub fn layer_surface(&mut self, surface: &Surface) -> LayerSurface {
        let output = self.output.clone();
        get_layer_surface(self, surface, Some(output), Layer::Background as u32, "test".into()).unwrap()
    }

    /// A committed layer surface, its initial configure not acked yet
    pub fn mapped_layer(&mut self, anchor: Anchor, (width, height): (u32, u32)) -> (Surface, LayerSurface) {
        let surface = self.create_surface();
        let layer = self.layer_surface(&surface);
        handle_layer_surface_request(self, &layer, LayerSurfaceRequest::SetAnchor(anchor.bits()));
        handle_layer_surface_request(self, &layer, LayerSurfaceRequest::SetSize { width, height });
        handle_surface_request(self, &surface, SurfaceRequest::Commit);
        surface.client().drain_events();
        (surface, layer)
    }

    // Every lock surface gets its own output, one lock surface per output is allowed.
    fn lock_surface(&mut self, surface: &Surface) -> LockSurface {
        let current = self.session_lock_state.current_lock().cloned();
        let lock = match current {
            Some(lock) => lock,
            None => {
                let client = self.client.clone();
                let lock = session_lock::lock(self, &client).unwrap();
                if let Some(locker) = self.lockers.pop() {
                    locker.lock();
                }
                lock
            }
        };
        let output = Output::new(format!("HEADLESS-{}", self.outputs.len() + 2), full_hd());
        self.outputs.push(output.clone());
        let lock_surface = get_lock_surface(self, &lock, surface, &output).unwrap();
        self.client.drain_events();
        lock_surface
    }
}

// RUST_LOG=shellwright=trace shows what the handlers did in a failing test.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn full_hd() -> Rectangle<i32, Logical> {
    Rectangle::from_loc_and_size((0, 0), (1920, 1080))
}

fn positioner_for(anchor: Rectangle<i32, Logical>) -> Positioner {
    let mut positioner = Positioner::new();
    positioner.set_size(anchor.size.w, anchor.size.h).unwrap();
    positioner
        .set_anchor_rect(anchor.loc.x, anchor.loc.y, anchor.size.w, anchor.size.h)
        .unwrap();
    positioner
}

impl CompositorHandler for TestState {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn commit(&mut self, surface: &Surface) {
        self.commits.push(surface.id());
    }

    fn destroyed(&mut self, surface: &Surface) {
        self.destroyed.push(surface.id());
    }
}

impl XdgShellHandler for TestState {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, _surface: ToplevelSurface) {}

    fn new_popup(&mut self, _surface: PopupSurface, _positioner: PositionerState) {}

    fn maximize_request(&mut self, surface: ToplevelSurface) {
        self.maximize_requests += 1;
        let _ = surface.with_pending_state(|state| state.size = Some((1920, 1080).into()));
    }

    fn reposition_request(&mut self, _surface: PopupSurface, _positioner: PositionerState, token: u32) {
        self.repositions.push(token);
    }
}

impl WlrLayerShellHandler for TestState {
    fn shell_state(&mut self) -> &mut WlrLayerShellState {
        &mut self.layer_shell_state
    }

    fn new_layer_surface(&mut self, _surface: LayerSurface, _output: Option<Output>, _layer: Layer, _namespace: String) {}

    fn layer_placed(&mut self, surface: LayerSurface, placement: LayerGeometry) {
        self.placements.push((surface, placement));
    }
}

impl SessionLockHandler for TestState {
    fn session_lock_state(&mut self) -> &mut SessionLockState {
        &mut self.session_lock_state
    }

    fn lock(&mut self, confirmation: SessionLocker) {
        self.lockers.push(confirmation);
    }

    fn unlock(&mut self) {
        self.unlocks += 1;
    }

    fn new_surface(&mut self, _surface: LockSurface, _output: Output) {}
}

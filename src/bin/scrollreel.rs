use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use scrollreel::{
    EncodeSettings, HttpAccessApi, InviteGenerator, LandingPage, LoginForm, PageView,
    ScrollProgress, SiteConfig, Size, Stage, SystemClipboard, open_source, pipeline,
};

#[derive(Parser, Debug)]
#[command(name = "scrollreel", version, about = "Scroll-scrubbed landing page renderer")]
struct Cli {
    /// Debug-level logging (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the page at one scroll position as a PNG.
    Frame(FrameArgs),
    /// Scroll top to bottom and encode every frame as MP4 (requires `ffmpeg` on PATH).
    Sweep(SweepArgs),
    /// Check an access code against the endpoint.
    Login(LoginArgs),
    /// Mint an invite code with an admin's access code.
    Invite(InviteArgs),
    /// Run the whole page flow: gate, welcome, then the persistent UI.
    Visit(VisitArgs),
}

#[derive(Args, Debug)]
struct StageArgs {
    /// Site config JSON.
    #[arg(long)]
    config: PathBuf,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Give up if media is not ready after this many seconds.
    #[arg(long, default_value_t = 120)]
    ready_timeout_secs: u64,
}

impl StageArgs {
    fn viewport(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn load(&self) -> anyhow::Result<SiteConfig> {
        SiteConfig::load(&self.config)
            .with_context(|| format!("load config '{}'", self.config.display()))
    }
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    stage: StageArgs,

    /// Scroll progress in [0, 1].
    #[arg(long)]
    progress: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Print the debug HUD as JSON.
    #[arg(long)]
    hud: bool,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    stage: StageArgs,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Number of evenly spaced scroll positions.
    #[arg(long, default_value_t = 240)]
    steps: usize,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// x264 constant rate factor.
    #[arg(long)]
    crf: Option<u8>,
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long)]
    code: String,

    /// Access endpoint; SCROLLREEL_API_URL or the built-in endpoint otherwise.
    #[arg(long)]
    api: Option<String>,
}

#[derive(Args, Debug)]
struct InviteArgs {
    /// Access code of the issuing admin.
    #[arg(long)]
    admin_code: String,

    /// Invitee name.
    #[arg(long)]
    name: String,

    #[arg(long, default_value = "")]
    details: String,

    /// Also put the minted code on the system clipboard.
    #[arg(long)]
    copy: bool,

    #[arg(long)]
    api: Option<String>,
}

#[derive(Args, Debug)]
struct VisitArgs {
    #[command(flatten)]
    stage: StageArgs,

    #[arg(long)]
    code: String,

    /// Write the page at this progress once everything has settled.
    #[arg(long, requires = "progress")]
    out: Option<PathBuf>,

    #[arg(long)]
    progress: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Sweep(args) => cmd_sweep(args),
        Command::Login(args) => cmd_login(args),
        Command::Invite(args) => cmd_invite(args),
        Command::Visit(args) => cmd_visit(args),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn access_api(api: Option<String>) -> anyhow::Result<HttpAccessApi> {
    let url = match api {
        Some(url) => url,
        None => {
            let mut cfg = SiteConfig::default();
            cfg.apply_env();
            cfg.api_url
        }
    };
    Ok(HttpAccessApi::new(url)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = args.stage.load()?;
    let mut stage = pipeline::mount_ready(
        &cfg,
        args.stage.viewport(),
        Duration::from_secs(args.stage.ready_timeout_secs),
    )?;
    let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::new(args.progress))?;
    pipeline::write_png(&frame, &args.out)?;
    if args.hud {
        print_json(&stage.hud())?;
    }
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let cfg = args.stage.load()?;
    let viewport = args.stage.viewport();
    let mut stage = pipeline::mount_ready(
        &cfg,
        viewport,
        Duration::from_secs(args.stage.ready_timeout_secs),
    )?;
    let mut settings = EncodeSettings::mp4(args.out.clone(), viewport, args.fps);
    settings.crf = args.crf;
    let stats = pipeline::sweep_to_mp4(&mut stage, args.steps, settings, cfg.theme.background)?;
    eprintln!(
        "wrote {} ({} frames, {} media draws)",
        args.out.display(),
        stats.frames,
        stats.media_draws
    );
    Ok(())
}

fn cmd_login(args: LoginArgs) -> anyhow::Result<()> {
    let api = access_api(args.api)?;
    let mut form = LoginForm::new();
    form.set_code(&args.code);
    match form.submit(&api) {
        Some(user) => print_json(&user),
        None => anyhow::bail!("{}", form.error().unwrap_or("login failed")),
    }
}

fn cmd_invite(args: InviteArgs) -> anyhow::Result<()> {
    let api = access_api(args.api)?;
    let mut invites = InviteGenerator::new();
    invites.open();
    invites.set_name(&args.name);
    invites.set_details(&args.details);
    anyhow::ensure!(invites.can_submit(), "invitee name must be non-empty");
    invites.submit(&api, &args.admin_code);

    let Some(code) = invites.generated_code() else {
        anyhow::bail!("{}", invites.error().unwrap_or("invite generation failed"));
    };
    println!("{code}");
    if args.copy {
        let mut clipboard = SystemClipboard;
        match invites.copy_code(&mut clipboard) {
            Ok(_) => eprintln!("copied to clipboard"),
            Err(err) => eprintln!("clipboard: {err}"),
        }
    }
    Ok(())
}

fn report(view: &PageView) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(view)?);
    Ok(())
}

fn cmd_visit(args: VisitArgs) -> anyhow::Result<()> {
    let cfg = args.stage.load()?;
    let api = HttpAccessApi::new(cfg.api_url.clone())?;
    let timeout = Duration::from_secs(args.stage.ready_timeout_secs);

    let mut page = LandingPage::new(Duration::from_millis(cfg.welcome_ms));
    report(&page.view())?;
    let Some(form) = page.login_form_mut() else {
        anyhow::bail!("page unexpectedly admitted before login");
    };
    form.set_code(&args.code);
    if !page.submit_login(&api, Instant::now()) {
        report(&page.view())?;
        anyhow::bail!("access denied");
    }
    report(&page.view())?;

    // Media preloads behind the welcome screen.
    let source = open_source(cfg.asset_root(), &cfg.base_path)?;
    let mut stage = Stage::mount(&cfg, source, args.stage.viewport())?;
    let started = Instant::now();
    let mut welcomed = false;
    let mut ready = stage.readiness().is_ready();
    while !(welcomed && ready) {
        let now = Instant::now();
        if page.tick(now) {
            welcomed = true;
            report(&page.view())?;
        }
        if !ready && stage.poll()? {
            ready = true;
            println!("{}", serde_json::to_string(&stage.hud())?);
        }
        if !ready && started.elapsed() > timeout {
            anyhow::bail!("media not ready after {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    if let (Some(out), Some(p)) = (args.out, args.progress) {
        let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::new(p))?;
        pipeline::write_png(&frame, &out)?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

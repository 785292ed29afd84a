//! Access plan explorer.
//!
//! Plans a single access site described on the command line and prints the
//! resulting plan and session statistics. `RUST_LOG=debug` shows the policy
//! decisions and fallbacks.

use bumpalo::Bump;
use clap::Parser;
use sendplan::core::{GenerationSession, HwConfig, HwGen};
use sendplan::ir::{DataType, Expr};
use sendplan::send::{
    cache_settings, resolve_send_params, AddressSpace, BufferHandles, CacheHint, OperandRole,
    SendOp, TileHint,
};
use sendplan::tensor::MemoryView;

/// One view dimension, `extent:stride[:bound]`.
#[derive(Debug, Clone, Copy)]
struct DimArg {
    extent: u64,
    stride: i64,
    bound: Option<u64>,
}

fn parse_dim(s: &str) -> Result<DimArg, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(format!("expected EXTENT:STRIDE[:BOUND], got {s}"));
    }
    let num_err = |what: &str, v: &str| format!("invalid {what} '{v}'");
    let extent = parts[0].parse().map_err(|_| num_err("extent", parts[0]))?;
    let stride = parts[1].parse().map_err(|_| num_err("stride", parts[1]))?;
    let bound = match parts.get(2) {
        Some(b) => Some(b.parse().map_err(|_| num_err("bound", b))?),
        None => None,
    };
    Ok(DimArg {
        extent,
        stride,
        bound,
    })
}

#[derive(Debug, Parser)]
#[command(name = "sendplan")]
#[command(about = "Plan the send messages of one GPU memory access", long_about = None)]
struct Cli {
    /// View dimensions, outermost first
    #[arg(value_name = "EXTENT:STRIDE[:BOUND]", required = true, value_parser = parse_dim)]
    dims: Vec<DimArg>,

    /// Hardware generation (gen9, gen11, xelp, xehp, xehpg, xehpc, xe2, xe3)
    #[arg(long, default_value = "xehpc")]
    gen: HwGen,

    /// Override the register granule in bytes
    #[arg(long)]
    grf_size: Option<u32>,

    /// Operation (load, store, prefetch, atomic_add, atomic_fadd, atomic_cmpwr)
    #[arg(long, default_value = "load")]
    op: SendOp,

    /// Address space (a64, slm)
    #[arg(long, default_value = "a64")]
    address: AddressSpace,

    /// Element type
    #[arg(short = 't', long = "type", default_value = "f32")]
    elem_type: DataType,

    /// Byte alignment of a symbolic base offset
    #[arg(long)]
    base_align: Option<u32>,

    /// Cache hint (cache:undef, cache:load_once)
    #[arg(long, default_value = "cache:undef")]
    cache: CacheHint,

    /// Preferred 2D tile width in elements
    #[arg(long)]
    tile_width: Option<u32>,

    /// Preferred 2D tile height in rows
    #[arg(long)]
    tile_height: Option<u32>,

    /// Repack the 2D tile to VNNI
    #[arg(long)]
    vnni: bool,

    /// Transpose the 2D tile
    #[arg(long)]
    transpose: bool,

    /// Use the standard 2D hint of a systolic operand (a, b, c)
    #[arg(long, conflicts_with_all = ["tile_width", "tile_height"])]
    dpas: Option<OperandRole>,

    /// Prefer packed register layouts over dword-strided ones
    #[arg(long)]
    prefer_dense: bool,

    /// Fail instead of falling back to linear messages
    #[arg(long)]
    no_legacy: bool,

    /// Do not zero-fill out-of-bounds loads
    #[arg(long)]
    no_fill: bool,
}

impl Cli {
    fn tile_hint(&self) -> TileHint {
        if let Some(role) = self.dpas {
            return TileHint::for_dpas_operand(role, self.elem_type);
        }
        let shaped = self.tile_width.is_some() || self.tile_height.is_some();
        if !shaped && !self.vnni && !self.transpose {
            return TileHint::new(self.elem_type);
        }
        TileHint::enabled(
            self.elem_type,
            self.tile_width.unwrap_or(0),
            self.tile_height.unwrap_or(0),
        )
        .with_vnni(self.vnni)
        .with_transpose(self.transpose)
    }

    fn view(&self) -> Result<MemoryView, String> {
        if self.elem_type.is_block_unit() || self.elem_type == DataType::Bool {
            return Err(format!("{} is not a memory element type", self.elem_type));
        }
        let dims: Vec<(u64, i64)> = self.dims.iter().map(|d| (d.extent, d.stride)).collect();
        let mut view = MemoryView::new(self.elem_type, &dims);
        for (idx, d) in self.dims.iter().enumerate() {
            if let Some(bound) = d.bound {
                view = view.with_bound(idx, bound);
            }
        }
        if let Some(align) = self.base_align {
            if !align.is_power_of_two() {
                return Err(format!("base alignment {align} is not a power of two"));
            }
            view = view.with_base(Expr::var("off", DataType::S64), align);
        }
        Ok(view)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut hw = HwConfig::new(cli.gen);
    if let Some(grf) = cli.grf_size {
        if !grf.is_power_of_two() {
            return Err(format!("register granule {grf} is not a power of two").into());
        }
        hw = hw.with_grf_size(grf);
    }
    let view = cli.view()?;

    let mut params =
        resolve_send_params(&hw, cli.op, cli.address, &view, cli.cache, cli.tile_hint());
    params.prefer_dense = cli.prefer_dense;
    params.allow_legacy = !cli.no_legacy;

    let mem = match cli.address {
        AddressSpace::A64 => Expr::var("A", DataType::U64),
        AddressSpace::Slm => Expr::var("slm", DataType::U32),
    };
    let buffers = BufferHandles::new(
        mem,
        Expr::var("reg", DataType::U32),
        Expr::var("hdr", DataType::U32),
    );

    let arena = Bump::new();
    let session = GenerationSession::new(&arena);
    match session.build_access(&view, buffers, params, !cli.no_fill) {
        Ok(plan) => {
            print!("{plan}");
            if let Some(first) = plan.messages.first() {
                println!("Cache settings:       {}", cache_settings(&first.msg, &hw));
            }
            if plan.used_fallback {
                println!("2D transfer rejected, linear messages used");
            }
            println!();
            print!("{}", session.stats());
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

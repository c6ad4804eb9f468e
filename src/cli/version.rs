use sigmoji::stark::CircuitSpec;
use sigmoji::{ProvingBackend, StarkBackend};

/// Display version information
pub fn execute() {
    let circuit = CircuitSpec::default();
    println!("sigmoji {}", env!("CARGO_PKG_VERSION"));
    println!("Card-attested anonymous fleet messaging");
    println!(
        "Proof backend: {} (circuit {} v{}, max depth {})",
        StarkBackend.name(),
        circuit.id,
        circuit.version,
        circuit.max_depth
    );
}

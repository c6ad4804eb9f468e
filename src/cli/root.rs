use sigmoji::Fleet;

/// Print the registry's membership root
pub async fn execute(fleet: &Fleet) -> Result<(), Box<dyn std::error::Error>> {
    println!("Cards: {}", fleet.registry().len());
    println!("Depth: {}", fleet.tree().depth());
    println!("Root:  {}", hex::encode(fleet.root()));
    Ok(())
}

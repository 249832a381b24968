//! `recruitr tools`: List the ATS tool catalogue.

pub fn run() {
    let registry = recruitr_tools::registry();
    println!("{} tools available:", registry.len());
    println!();
    for tool in registry.list() {
        let kind = match &tool.invocation {
            recruitr_core::Invocation::Query { .. } => "query",
            recruitr_core::Invocation::Composite(_) => "composite",
        };
        println!("  {:<32} [{kind}]", tool.name);
        println!("      {}", tool.description);
    }
}

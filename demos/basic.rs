//! Basic State Machine
//!
//! This example walks a three-state machine from start to done.
//!
//! Key concepts:
//! - Declaring states with `state_enum!`
//! - Handlers that read and write the shared context
//! - Inspecting the run summary and history
//!
//! Run with: cargo run --example basic

use switchyard::logging::LoggingConfig;
use switchyard::{state_enum, Context, StateMachine};

state_enum! {
    enum Order {
        Received,
        Packed,
        Shipped,
    }
    start: Received
    done: Shipped
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    LoggingConfig::init()?;

    println!("=== Basic State Machine Example ===\n");

    let mut machine = StateMachine::new().named("orders");
    let items: Vec<String> = ["book", "lamp", "mug"].map(String::from).to_vec();
    machine.context().insert("items", items);
    machine.context().insert("weight_grams", 0_u32);

    machine
        .on(Order::Received, |ctx: &Context| {
            let count = ctx.with("items", |items: &Vec<String>| items.len())?;
            println!("Received order with {count} items");
            Ok(Order::Packed.into())
        })?
        .on(Order::Packed, |ctx: &Context| {
            let items: Vec<String> = ctx.get("items")?;
            for item in &items {
                ctx.update("weight_grams", |w: &mut u32| *w += 250)?;
                println!("  packed {item}");
            }
            Ok(Order::Shipped.into())
        })?;

    let summary = machine.run()?;

    println!("\n=== Summary ===");
    println!("Termination: {:?}", summary.termination);
    println!("Generations: {}", summary.generations);
    println!(
        "Parcel weight: {}g",
        machine.context().get::<u32>("weight_grams")?
    );
    println!("History:\n{}", summary.history.to_json()?);

    Ok(())
}

//! Nested Sub-Machine
//!
//! This example embeds a retrying payment machine as one state of a
//! checkout machine.
//!
//! Key concepts:
//! - Registering a whole machine as the handler of a parent state
//! - Parent and child sharing one context
//! - Stall policies for a child that gives up early
//!
//! Run with: cargo run --example sub_machine

use std::sync::Arc;
use switchyard::builder::always;
use switchyard::logging::LoggingConfig;
use switchyard::{state_enum, Context, StallPolicy, StateMachine, StateSet, SubMachine};

state_enum! {
    enum Checkout {
        Cart,
        Payment,
        Receipt,
        Closed,
    }
    start: Cart
    done: Closed
}

state_enum! {
    enum Charge {
        Authorize,
        Retry,
        Captured,
    }
    start: Authorize
    done: Captured
}

const MAX_ATTEMPTS: u32 = 3;

fn payment_machine(
    context: Arc<Context>,
) -> Result<StateMachine<Charge>, Box<dyn std::error::Error>> {
    let mut payment = StateMachine::with_context(context).named("payment");
    payment
        .on(Charge::Authorize, |ctx: &Context| {
            let attempt = ctx.with_mut("attempts", |n: &mut u32| {
                *n += 1;
                *n
            })?;
            // The card issuer declines the first attempt.
            if attempt < 2 {
                println!("  attempt {attempt}: declined");
                Ok(Charge::Retry.into())
            } else {
                println!("  attempt {attempt}: approved");
                Ok(Charge::Captured.into())
            }
        })?
        .on(Charge::Retry, |ctx: &Context| {
            let attempts: u32 = ctx.get("attempts")?;
            if attempts >= MAX_ATTEMPTS {
                // An empty successor set ends the child short of Captured.
                return Ok(StateSet::new());
            }
            Ok(Charge::Authorize.into())
        })?;
    Ok(payment)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    LoggingConfig::init()?;

    println!("=== Nested Sub-Machine Example ===\n");

    let context = Arc::new(Context::new());
    context.insert("attempts", 0_u32);
    context.insert("total_cents", 0_u64);

    let mut checkout = StateMachine::with_context(Arc::clone(&context)).named("checkout");
    checkout
        .on(Checkout::Cart, |ctx: &Context| {
            ctx.replace("total_cents", 4_599_u64)?;
            println!("Cart total: $45.99");
            Ok(Checkout::Payment.into())
        })?
        .on_sub_machine(
            Checkout::Payment,
            SubMachine::new(payment_machine(Arc::clone(&context))?, Checkout::Receipt)
                .on_stall(StallPolicy::Fail),
        )?
        .on(Checkout::Receipt, |ctx: &Context| {
            let attempts: u32 = ctx.get("attempts")?;
            println!("Receipt issued after {attempts} payment attempts");
            Ok(Checkout::Closed.into())
        })?
        .on(Checkout::Closed, always(Checkout::Closed))?;

    let summary = checkout.run()?;

    println!("\n=== Summary ===");
    println!("Termination: {:?}", summary.termination);
    println!("Parent generations: {}", summary.generations);
    for step in summary.history.steps() {
        println!(
            "  #{} {:?}: [{}] -> [{}]",
            step.generation,
            step.mode,
            step.active.names(),
            step.next.names()
        );
    }

    Ok(())
}

//! AgentPay Demo - Complete Payment Cycle
//!
//! This example walks the full delegated-spending lifecycle:
//!
//! Session → Signed Intent → Pending Record → Settlement → Reconciled Budgets
//!
//! Run with:
//!   cargo run --example payment_cycle

use agentpay_sdk::{
    telemetry, AgentId, AgentPay, Amount, Config, CreateSessionRequest, PrincipalId,
    SignPaymentRequest, VerificationMode,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" Step 1: Principal delegates a spending session");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let pay = AgentPay::with_config(Config {
        verification: VerificationMode::FastPath,
        ..Default::default()
    });

    let principal = PrincipalId::new();
    let agent = AgentId::new();
    let session = pay
        .create_session(
            CreateSessionRequest::new(principal.clone(), agent.clone())
                .with_allowance(Amount::new(5_000))
                .with_max_requests(20)
                .with_duration_secs(3600),
        )
        .await?;

    println!("  Session:   {}", session.session_id);
    println!("  Allowance: {} units", session.allowance);
    println!("  Expires:   {}", session.expires_at);
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" Step 2: Agent signs a payment intent for a worker agent");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let worker = AgentId::new();
    let auth = pay
        .sign_payment(SignPaymentRequest {
            session_id: session.session_id.clone(),
            to_agent: worker.clone(),
            amount: Amount::new(250),
            task_type: "inference".to_string(),
            calling_agent: None,
        })
        .await?;

    println!("  Transaction: {}", auth.transaction_id);
    println!("  Nonce:       {}", auth.intent.intent.nonce);
    println!("  Signature:   {}…", &auth.intent.signature[..16]);
    println!("  Headroom:    {} units, {} requests", auth.allowance_remaining, auth.requests_remaining);
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" Step 3: Settlement confirms and budgets are debited");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let receipt = pay
        .settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
        .await?;

    println!("  Receipt:  {}", receipt.intent_hash);
    println!("  Settled:  {} units", receipt.settled_amount);
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" Step 4: Budget status and history reflect the settled spend");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let status = pay.budget_status(&session.session_id).await?;
    println!(
        "  Daily:   {} spent / {} remaining ({:.1}% used)",
        status.daily.spent, status.daily.remaining, status.daily.percent_used
    );
    println!(
        "  Monthly: {} spent / {} remaining ({:.1}% used)",
        status.monthly.spent, status.monthly.remaining, status.monthly.percent_used
    );

    for record in pay.history(&session.session_id, 10).await? {
        println!("  {} {} -> {:?}", record.id, record.amount, record.status);
    }

    Ok(())
}

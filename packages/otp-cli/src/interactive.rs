//! Prompt-driven rendition of the login and registration forms.

use anyhow::Result;
use colored::Colorize;
use console::Term;
use dialoguer::{theme::ColorfulTheme, Input, Select};

use otp_flow::{
    to_persian_digits, AuthResult, FlowKind, FormErrors, Navigation, OtpFlow, PhoneNumber, Step,
    SystemClock, UserType,
};

use crate::context::{Api, Context, Store};

type CliFlow = OtpFlow<Store, Api, SystemClock>;

/// How a single form ended.
pub enum FlowEnd {
    Completed(AuthResult),
    /// Login found no account for this phone.
    Redirect(PhoneNumber),
    Cancelled,
}

pub async fn run_flow(ctx: &Context, kind: FlowKind, phone: Option<String>) -> Result<FlowEnd> {
    let term = Term::stdout();
    let theme = ColorfulTheme::default();
    let mut flow: CliFlow = OtpFlow::new(
        kind,
        ctx.config.flow_config(),
        ctx.store.clone(),
        SystemClock,
        ctx.api.clone(),
    );

    print_header(kind);
    flow.mount(phone.as_deref()).await;
    if flow.step() == Step::CodeEntry {
        println!("{}", "Resuming the code you were already sent.".bright_blue());
    }

    loop {
        if flow.step() == Step::Completed {
            let result = flow.result().cloned();
            flow.unmount();
            return Ok(match result {
                Some(result) => FlowEnd::Completed(result),
                None => FlowEnd::Cancelled,
            });
        }
        if let Some(Navigation::Register { phone }) = flow.navigation() {
            let phone = phone.clone();
            flow.unmount();
            return Ok(FlowEnd::Redirect(phone));
        }

        print_errors(flow.errors());

        match flow.step() {
            Step::PhoneEntry => {
                let input: String = Input::with_theme(&theme)
                    .with_prompt("Mobile number (09xxxxxxxxx, empty to quit)")
                    .with_initial_text(flow.machine().phone_input())
                    .allow_empty(true)
                    .interact_text_on(&term)?;
                if input.trim().is_empty() {
                    return Ok(FlowEnd::Cancelled);
                }
                flow.submit_phone(&input).await;
            }
            Step::UserInfo => {
                let full_name: String = Input::with_theme(&theme)
                    .with_prompt("Full name (empty to go back)")
                    .with_initial_text(flow.machine().full_name())
                    .allow_empty(true)
                    .interact_text_on(&term)?;
                if full_name.trim().is_empty() {
                    flow.back().await;
                    continue;
                }

                let types = UserType::variants();
                let labels: Vec<String> = types
                    .iter()
                    .map(|t| format!("{} ({})", t.label(), t.code()))
                    .collect();
                let current = types
                    .iter()
                    .position(|t| *t == flow.machine().user_type())
                    .unwrap_or(0);
                let selection = Select::with_theme(&theme)
                    .with_prompt("Account type")
                    .items(&labels)
                    .default(current)
                    .interact_on(&term)?;

                flow.submit_user_info(&full_name, types[selection]).await;
            }
            Step::CodeEntry => code_entry(ctx, &term, &theme, &mut flow).await?,
            Step::Completed => {}
        }
    }
}

async fn code_entry(
    ctx: &Context,
    term: &Term,
    theme: &ColorfulTheme,
    flow: &mut CliFlow,
) -> Result<()> {
    if let Some(phone) = flow.machine().phone() {
        println!("Code sent to {}", to_persian_digits(phone.as_str()).bold());
    }
    if ctx.config.show_debug_code {
        if let Some(code) = flow.last_debug_code() {
            println!("{} {}", "debug code:".dimmed(), code.yellow());
        }
    }

    let resend = if flow.can_resend() {
        "Resend code".to_string()
    } else {
        format!("Resend code (in {})", flow.countdown_label())
    };
    let back = match flow.kind() {
        FlowKind::Login => "Back",
        FlowKind::Register => "Back to details",
    };
    let options = ["Enter code", resend.as_str(), "Edit phone number", back];

    let selection = Select::with_theme(theme)
        .with_prompt("Verification")
        .items(&options)
        .default(0)
        .interact_on(term)?;

    match selection {
        0 => {
            let code: String = Input::with_theme(theme)
                .with_prompt("6-digit code")
                .interact_text_on(term)?;
            flow.submit_code(&code).await;
        }
        1 => {
            if flow.can_resend() {
                flow.request_resend().await;
                println!("{}", "A new code has been sent.".bright_green());
            } else {
                println!(
                    "{}",
                    format!("You can request a new code in {}", flow.countdown_label()).yellow()
                );
            }
        }
        2 => flow.edit_phone().await,
        3 => flow.back().await,
        _ => unreachable!(),
    }
    Ok(())
}

fn print_header(kind: FlowKind) {
    let title = match kind {
        FlowKind::Login => "ورود به ماهرکار",
        FlowKind::Register => "ثبت نام در ماهرکار",
    };
    println!();
    println!("{}", format!("── {} ──", title).bright_cyan().bold());
}

fn print_errors(errors: &FormErrors) {
    for message in [
        &errors.general,
        &errors.phone,
        &errors.full_name,
        &errors.code,
    ]
    .into_iter()
    .flatten()
    {
        println!("{} {}", "✗".red(), message.red());
    }
}

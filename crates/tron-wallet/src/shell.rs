use crate::{
    chains::ChainGateway,
    console::Console,
    errors::is_input_closed,
    handlers::{self, App},
    menu::{self, Choice},
    session::Session,
};
use std::{
    io::{BufRead, Write},
    time::Duration,
};

const PAUSE: Duration = Duration::from_secs(1);

/// Drive the menu until the user exits or stdin closes. Returns the final session.
pub async fn run<R, W, G>(app: &App<G>, con: &mut Console<R, W>) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    con.blank()?;
    con.say("TRON Wallet Tool")?;
    con.blank()?;

    let mut session = Session::empty();
    let mut pause = false;

    loop {
        if pause && con.interactive() {
            tokio::time::sleep(PAUSE).await;
        }
        pause = false;

        con.clear_screen()?;
        handlers::display_info(&session, app, con).await?;
        con.say(&menu::render(session.state()))?;

        let input = match con.ask("Select an option (enter number): ") {
            Ok(v) => v,
            Err(e) if is_input_closed(&e) => break,
            Err(e) => return Err(e),
        };

        match menu::resolve(&input, session.state()) {
            Choice::Exit => break,
            Choice::Run(option) => {
                match handlers::run_action(option.action, &session, app, con).await {
                    Ok(next) => session = next,
                    Err(e) if is_input_closed(&e) => break,
                    Err(e) => return Err(e),
                }
                pause = option.needs_pause;
            }
            Choice::NeedsWallet(option) => {
                tracing::debug!(action = ?option.action, "wallet-gated choice without a wallet");
                con.blank()?;
                con.say("Please load a wallet first")?;
                con.say(&menu::invalid_choice_message(session.state()))?;
            }
            Choice::Invalid => {
                con.blank()?;
                con.say(&menu::invalid_choice_message(session.state()))?;
            }
        }
    }

    con.blank()?;
    con.say("bye!")?;
    con.blank()?;
    Ok(session)
}

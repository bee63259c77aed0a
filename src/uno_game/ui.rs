use super::card::{Card, Color};
use super::game::{GameState, Move, TurnPhase};
use super::player::{Player, PlayerId};
use std::io::{self, BufRead, BufReader, Write};

/// What a human seat chose from the turn menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Draw,
    Pass,
    Challenge,
    CallOut,
}

pub struct ConsoleUI {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl Default for ConsoleUI {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleUI {
    pub fn new() -> Self {
        Self {
            input: Box::new(BufReader::new(io::stdin())),
            output: Box::new(io::stdout()),
        }
    }

    pub fn with_streams(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Self { input, output }
    }

    /// Reads one trimmed line. Running out of input is an error so a closed
    /// stdin cannot spin the game loop forever.
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed",
            ));
        }
        Ok(line.trim().to_string())
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        self.read_line()
    }

    pub fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    pub fn display_game_state(&mut self, state: &GameState) -> io::Result<()> {
        writeln!(self.output, "\n--- Game State ---")?;
        writeln!(self.output, "Direction: {:?}", state.direction)?;
        writeln!(self.output, "Top card: {}", state.current_card)?;
        if state.current_card.is_wild() {
            writeln!(self.output, "Color in play: {}", state.current_color)?;
        }
        writeln!(self.output, "Draw pile: {} cards", state.draw_pile.len())?;

        for player in &state.players {
            let uno = if player.hand.len() == 1 && player.has_called_uno {
                " (UNO!)"
            } else {
                ""
            };
            writeln!(
                self.output,
                "  {}: {} cards{}",
                player.name,
                player.hand.len(),
                uno
            )?;
        }

        if state.pending_draw_count > 0 {
            writeln!(
                self.output,
                "Current player must draw {} cards or stack!",
                state.pending_draw_count
            )?;
        }
        Ok(())
    }

    /// Lists the hand, marking cards that can be played right now with `*`.
    pub fn display_player_hand(&mut self, player: &Player, playable: &[&Card]) -> io::Result<()> {
        writeln!(self.output, "\n{}'s hand:", player.name)?;
        for (i, card) in player.hand.iter().enumerate() {
            let marker = if playable.iter().any(|c| c.id == card.id) {
                "*"
            } else {
                " "
            };
            writeln!(self.output, "{} {}. {}", marker, i, card)?;
        }
        Ok(())
    }

    /// Shows the turn menu until a recognised choice is entered.
    pub fn get_player_action(&mut self, state: &GameState) -> io::Result<Action> {
        loop {
            writeln!(self.output, "\nWhat would you like to do?")?;
            writeln!(self.output, "1. Play a card")?;
            if state.turn_phase == TurnPhase::AfterDraw {
                writeln!(self.output, "3. Keep the drawn card and pass")?;
            } else {
                writeln!(self.output, "2. Draw a card")?;
            }
            if state.pending_draw_count >= 4 {
                writeln!(self.output, "4. Challenge the Wild Draw Four")?;
            }
            writeln!(self.output, "5. Call out a player who forgot UNO")?;

            match self.prompt("Enter your choice: ")?.as_str() {
                "1" => return Ok(Action::Play),
                "2" => return Ok(Action::Draw),
                "3" => return Ok(Action::Pass),
                "4" => return Ok(Action::Challenge),
                "5" => return Ok(Action::CallOut),
                _ => writeln!(self.output, "Invalid choice.")?,
            }
        }
    }

    /// `None` when the input is not a number.
    pub fn get_card_index(&mut self) -> io::Result<Option<usize>> {
        let index = self.prompt("Enter the index of the card you want to play: ")?;
        Ok(index.parse::<usize>().ok())
    }

    pub fn choose_color(&mut self) -> io::Result<Color> {
        loop {
            writeln!(self.output, "Choose a color:")?;
            writeln!(self.output, "1. Red")?;
            writeln!(self.output, "2. Green")?;
            writeln!(self.output, "3. Blue")?;
            writeln!(self.output, "4. Yellow")?;

            match self.prompt("Enter your choice: ")?.as_str() {
                "1" => return Ok(Color::Red),
                "2" => return Ok(Color::Green),
                "3" => return Ok(Color::Blue),
                "4" => return Ok(Color::Yellow),
                _ => writeln!(self.output, "Invalid choice. Please enter 1, 2, 3, or 4.")?,
            }
        }
    }

    pub fn confirm_uno(&mut self) -> io::Result<bool> {
        let answer = self.prompt("Call UNO? (y/n): ")?;
        Ok(answer.eq_ignore_ascii_case("y"))
    }

    /// Picks another seat to call out, `None` on a bad entry.
    pub fn choose_target(&mut self, state: &GameState, me: &str) -> io::Result<Option<PlayerId>> {
        let others: Vec<&Player> = state.players.iter().filter(|p| p.id != me).collect();
        for (i, player) in others.iter().enumerate() {
            writeln!(
                self.output,
                "{}. {} ({} cards)",
                i,
                player.name,
                player.hand.len()
            )?;
        }
        let choice = self.prompt("Who forgot to call UNO? ")?;
        Ok(choice
            .parse::<usize>()
            .ok()
            .and_then(|i| others.get(i))
            .map(|p| p.id.clone()))
    }

    /// Describes an accepted move; `after` is the state it produced.
    pub fn report_move(&mut self, player_name: &str, mv: &Move, after: &GameState) -> io::Result<()> {
        match mv {
            Move::Play { card, .. } if card.is_wild() => writeln!(
                self.output,
                "{} played {} and chose {}",
                player_name, card, after.current_color
            )?,
            Move::Play { card, .. } => writeln!(self.output, "{} played {}", player_name, card)?,
            Move::Draw => writeln!(self.output, "{} drew", player_name)?,
            Move::Pass => writeln!(self.output, "{} passed", player_name)?,
            Move::Challenge => writeln!(
                self.output,
                "{} challenged the Wild Draw Four",
                player_name
            )?,
            Move::ChallengeUno { target_player_id } => {
                let target = after
                    .player(target_player_id)
                    .map_or(target_player_id.as_str(), |p| p.name.as_str());
                writeln!(self.output, "{} called out {}", player_name, target)?
            }
        }

        if let Some(winner) = after.winner_id.as_deref().and_then(|id| after.player(id)) {
            writeln!(self.output, "{} has won the game!", winner.name)?;
        }
        Ok(())
    }
}

mod mock_exchange;
mod paper_trading;
mod scouting;

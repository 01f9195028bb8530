mod forecast;
mod views;

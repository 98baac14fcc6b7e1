pub mod lis;
